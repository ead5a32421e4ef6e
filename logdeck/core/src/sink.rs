//! Durable Sink
//!
//! Append-only destination for `(timestamp, level, text)` records. The render
//! server forwards every log message and exception here, independently of
//! console filtering and redraw throttling. The sink applies its own level.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::commands::LogLevel;
use crate::config::SinkConfig;
use crate::render::expand_template;

/// One record handed to a durable sink
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkRecord {
    /// When the event was handled
    pub timestamp: DateTime<Local>,
    /// Severity
    pub level: LogLevel,
    /// Message body
    pub text: String,
}

/// Destination for records that must outlive the screen
pub trait DurableSink: Send {
    /// Persist a record if it passes the sink's level
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; callers treat it as non-fatal.
    fn record(&mut self, record: &SinkRecord) -> io::Result<()>;

    /// Change the sink's level
    fn set_level(&mut self, level: LogLevel);

    /// Current level
    fn level(&self) -> LogLevel;
}

// =============================================================================
// Rotating file sink
// =============================================================================

/// Size-rotated log file with bounded history
///
/// When writing a line would push the active file past `max_bytes`, the file
/// is renamed to `<path>.1`, older backups shift up by one, and anything past
/// `max_backups` is deleted.
#[derive(Debug)]
pub struct RotatingFileSink {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    max_backups: usize,
    level: LogLevel,
    line_format: String,
    timestamp_format: String,
}

impl RotatingFileSink {
    /// Open (or create) the active log file in append mode
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be created.
    pub fn open(config: &SinkConfig) -> io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = open_append(&config.path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path: config.path.clone(),
            file,
            written,
            max_bytes: config.max_bytes,
            max_backups: config.max_backups,
            level: config.level,
            line_format: config.line_format.clone(),
            timestamp_format: config.timestamp_format.clone(),
        })
    }

    /// Path of the active file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_backups == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.max_backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.max_backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        tracing::debug!(path = %self.path.display(), "Rotated log file");
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl DurableSink for RotatingFileSink {
    fn record(&mut self, record: &SinkRecord) -> io::Result<()> {
        if !record.level.passes(self.level) {
            return Ok(());
        }

        let timestamp = record.timestamp.format(&self.timestamp_format).to_string();
        let mut line = expand_template(
            &self.line_format,
            &[
                ("timestamp", timestamp.as_str()),
                ("level", record.level.label()),
                ("text", record.text.as_str()),
            ],
        );
        line.push('\n');

        let len = line.len() as u64;
        if self.written > 0 && self.written + len > self.max_bytes {
            self.rotate()?;
        }

        self.file.write_all(line.as_bytes())?;
        self.written += len;
        Ok(())
    }

    fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    fn level(&self) -> LogLevel {
        self.level
    }
}

// =============================================================================
// In-memory and null sinks
// =============================================================================

/// Sink that keeps records in memory; clones share storage
#[derive(Clone, Debug)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SinkRecord>>>,
    level: Arc<Mutex<LogLevel>>,
}

impl MemorySink {
    /// Create an empty sink accepting every level
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            level: Arc::new(Mutex::new(LogLevel::Debug)),
        }
    }

    /// Snapshot of the stored records
    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableSink for MemorySink {
    fn record(&mut self, record: &SinkRecord) -> io::Result<()> {
        if record.level.passes(*self.level.lock()) {
            self.records.lock().push(record.clone());
        }
        Ok(())
    }

    fn set_level(&mut self, level: LogLevel) {
        *self.level.lock() = level;
    }

    fn level(&self) -> LogLevel {
        *self.level.lock()
    }
}

/// Sink that discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink {
    level: LogLevel,
}

impl DurableSink for NullSink {
    fn record(&mut self, _record: &SinkRecord) -> io::Result<()> {
        Ok(())
    }

    fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    fn level(&self) -> LogLevel {
        self.level
    }
}

/// Build the sink described by `config`: a rotating file, or nothing
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn sink_from_config(config: &SinkConfig) -> io::Result<Box<dyn DurableSink>> {
    if config.enabled {
        Ok(Box::new(RotatingFileSink::open(config)?))
    } else {
        Ok(Box::new(NullSink {
            level: config.level,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: LogLevel, text: &str) -> SinkRecord {
        SinkRecord {
            timestamp: Local::now(),
            level,
            text: text.to_string(),
        }
    }

    fn sink_config(dir: &Path, max_bytes: u64, max_backups: usize) -> SinkConfig {
        SinkConfig {
            path: dir.join("logging.log"),
            max_bytes,
            max_backups,
            line_format: "[{level}] {text}".to_string(),
            ..SinkConfig::default()
        }
    }

    #[test]
    fn test_writes_formatted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = sink_config(dir.path(), 1024, 2);
        let mut sink = RotatingFileSink::open(&config).unwrap();

        sink.record(&record(LogLevel::Warning, "disk almost full"))
            .unwrap();

        let content = fs::read_to_string(&config.path).unwrap();
        assert_eq!(content, "[WARNING] disk almost full\n");
    }

    #[test]
    fn test_level_filter() {
        let dir = tempfile::tempdir().unwrap();
        let config = sink_config(dir.path(), 1024, 2);
        let mut sink = RotatingFileSink::open(&config).unwrap();

        sink.record(&record(LogLevel::Debug, "hidden")).unwrap();
        sink.set_level(LogLevel::Debug);
        sink.record(&record(LogLevel::Debug, "shown")).unwrap();

        let content = fs::read_to_string(&config.path).unwrap();
        assert_eq!(content, "[DEBUG] shown\n");
    }

    #[test]
    fn test_rotation_keeps_bounded_history() {
        let dir = tempfile::tempdir().unwrap();
        // Each line is "[INFO] n\n" = 9 bytes, so every line rotates
        let config = sink_config(dir.path(), 10, 2);
        let mut sink = RotatingFileSink::open(&config).unwrap();

        for n in 1..=4 {
            sink.record(&record(LogLevel::Info, &n.to_string())).unwrap();
        }

        let read = |suffix: &str| {
            let mut name = config.path.clone().into_os_string();
            name.push(suffix);
            fs::read_to_string(PathBuf::from(name)).ok()
        };
        assert_eq!(read("").as_deref(), Some("[INFO] 4\n"));
        assert_eq!(read(".1").as_deref(), Some("[INFO] 3\n"));
        assert_eq!(read(".2").as_deref(), Some("[INFO] 2\n"));
        assert_eq!(read(".3"), None);
    }

    #[test]
    fn test_zero_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let config = sink_config(dir.path(), 10, 0);
        let mut sink = RotatingFileSink::open(&config).unwrap();

        sink.record(&record(LogLevel::Info, "1")).unwrap();
        sink.record(&record(LogLevel::Info, "2")).unwrap();

        assert_eq!(fs::read_to_string(&config.path).unwrap(), "[INFO] 2\n");
    }

    #[test]
    fn test_memory_sink_shares_records() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.set_level(LogLevel::Error);

        writer.record(&record(LogLevel::Info, "skipped")).unwrap();
        writer.record(&record(LogLevel::Critical, "kept")).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "kept");
    }

    #[test]
    fn test_disabled_config_builds_null_sink() {
        let config = SinkConfig {
            enabled: false,
            path: PathBuf::from("/nonexistent/dir/never.log"),
            ..SinkConfig::default()
        };
        let mut sink = sink_from_config(&config).unwrap();
        assert!(sink.record(&record(LogLevel::Critical, "x")).is_ok());
    }
}
