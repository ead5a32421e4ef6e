//! Configuration
//!
//! Runtime tunables of the render server and the durable sink, loaded from a
//! TOML file at `~/.config/logdeck/logdeck.toml`, environment variables and
//! CLI overrides.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`LOGDECK_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! Everything in [`RenderConfig`] can also be swapped at runtime by sending a
//! `SetConfiguration` command; buffer contents survive the swap.
//!
//! # Example Configuration
//!
//! ```toml
//! [render]
//! message_capacity = 15
//! exception_capacity = 3
//! permanent_slots = 4
//! redraw_interval_ms = 250
//! console_level = "debug"
//! task_removal_delay_ms = 0
//!
//! [sink]
//! path = "/var/log/myjob/logging.log"
//! max_bytes = 1048576
//! max_backups = 3
//! level = "warning"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::LogLevel;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Hot-swappable tunables of the render server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Messages kept on screen
    pub message_capacity: usize,
    /// Exceptions kept on screen
    pub exception_capacity: usize,
    /// Bar rows reserved even when fewer tasks exist
    pub permanent_slots: usize,
    /// Minimum time between two repaints
    pub redraw_interval: Duration,
    /// Messages below this level are not shown on the console
    pub console_level: LogLevel,
    /// Time a completed task stays visible before removal
    pub task_removal_delay: Duration,
    /// chrono strftime pattern for `{timestamp}`
    pub timestamp_format: String,
    /// Template for console messages: `{timestamp}`, `{level}`, `{text}`
    pub message_format: String,
    /// Template for exceptions: `{timestamp}`, `{producer}`, `{label}`, `{text}`
    pub exception_format: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            message_capacity: 20,
            exception_capacity: 5,
            permanent_slots: 0,
            redraw_interval: Duration::from_millis(500),
            console_level: LogLevel::Info,
            task_removal_delay: Duration::from_millis(500),
            timestamp_format: "%d %B %Y %H:%M:%S".to_string(),
            message_format: "{timestamp} [{level}]\t{text}".to_string(),
            exception_format: "{timestamp} [EXCEPTION]\t[Producer {producer}{label}]:\n{text}"
                .to_string(),
        }
    }
}

impl RenderConfig {
    /// Check templates for the placeholders they cannot do without
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.message_format.contains("{text}") {
            return Err(ConfigError::ValidationError(
                "message_format must contain {text}".to_string(),
            ));
        }
        if !self.exception_format.contains("{text}") {
            return Err(ConfigError::ValidationError(
                "exception_format must contain {text}".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of the rotating file sink
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Whether records are written at all
    pub enabled: bool,
    /// Active log file; backups are `<path>.1` .. `<path>.N`
    pub path: PathBuf,
    /// Size that triggers rotation
    pub max_bytes: u64,
    /// Number of rotated files kept
    pub max_backups: usize,
    /// Records below this level are dropped
    pub level: LogLevel,
    /// Template for file lines: `{timestamp}`, `{level}`, `{text}`
    pub line_format: String,
    /// chrono strftime pattern for `{timestamp}`
    pub timestamp_format: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("logging.log"),
            max_bytes: 10 * 1024 * 1024,
            max_backups: 5,
            level: LogLevel::Info,
            line_format: "{timestamp} [{level}] {text}".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Render section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Messages kept on screen
    pub message_capacity: Option<usize>,
    /// Exceptions kept on screen
    pub exception_capacity: Option<usize>,
    /// Reserved bar rows
    pub permanent_slots: Option<usize>,
    /// Minimum time between repaints in milliseconds
    pub redraw_interval_ms: Option<u64>,
    /// Console filter level
    pub console_level: Option<LogLevel>,
    /// Completed-task removal delay in milliseconds
    pub task_removal_delay_ms: Option<u64>,
    /// Timestamp pattern
    pub timestamp_format: Option<String>,
    /// Message template
    pub message_format: Option<String>,
    /// Exception template
    pub exception_format: Option<String>,
}

/// Sink section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkToml {
    /// Whether the file sink is enabled
    pub enabled: Option<bool>,
    /// Log file path
    pub path: Option<PathBuf>,
    /// Rotation threshold in bytes
    pub max_bytes: Option<u64>,
    /// Rotated files kept
    pub max_backups: Option<usize>,
    /// File filter level
    pub level: Option<LogLevel>,
    /// Line template
    pub line_format: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogdeckToml {
    /// Render server section
    pub render: RenderToml,
    /// Durable sink section
    pub sink: SinkToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Fully resolved configuration
#[derive(Clone, Debug)]
pub struct LogdeckConfig {
    /// Render server tunables
    pub render: RenderConfig,
    /// Durable sink settings
    pub sink: SinkConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    source: ConfigSource,
}

impl Default for LogdeckConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            sink: SinkConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl LogdeckConfig {
    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Validate both sections
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.render.validate()?;
        if self.sink.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "sink.max_bytes must be greater than zero".to_string(),
            ));
        }
        if !self.sink.line_format.contains("{text}") {
            return Err(ConfigError::ValidationError(
                "sink.line_format must contain {text}".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/logdeck/logdeck.toml` or
/// `~/.config/logdeck/logdeck.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("logdeck").join("logdeck.toml"))
}

/// Load configuration from the default path, environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resolved configuration is invalid.
pub fn load_config() -> Result<LogdeckConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// A missing file is not an error (defaults are used).
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the resolved
/// configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<LogdeckConfig, ConfigError> {
    let mut config = LogdeckConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: LogdeckToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |name| std::env::var(name).ok());

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
pub fn apply_toml_config(config: &mut LogdeckConfig, toml: &LogdeckToml) {
    let render = &mut config.render;
    if let Some(n) = toml.render.message_capacity {
        render.message_capacity = n;
    }
    if let Some(n) = toml.render.exception_capacity {
        render.exception_capacity = n;
    }
    if let Some(n) = toml.render.permanent_slots {
        render.permanent_slots = n;
    }
    if let Some(ms) = toml.render.redraw_interval_ms {
        render.redraw_interval = Duration::from_millis(ms);
    }
    if let Some(level) = toml.render.console_level {
        render.console_level = level;
    }
    if let Some(ms) = toml.render.task_removal_delay_ms {
        render.task_removal_delay = Duration::from_millis(ms);
    }
    if let Some(ref fmt) = toml.render.timestamp_format {
        render.timestamp_format.clone_from(fmt);
    }
    if let Some(ref fmt) = toml.render.message_format {
        render.message_format.clone_from(fmt);
    }
    if let Some(ref fmt) = toml.render.exception_format {
        render.exception_format.clone_from(fmt);
    }

    let sink = &mut config.sink;
    if let Some(enabled) = toml.sink.enabled {
        sink.enabled = enabled;
    }
    if let Some(ref path) = toml.sink.path {
        sink.path.clone_from(path);
    }
    if let Some(bytes) = toml.sink.max_bytes {
        sink.max_bytes = bytes;
    }
    if let Some(backups) = toml.sink.max_backups {
        sink.max_backups = backups;
    }
    if let Some(level) = toml.sink.level {
        sink.level = level;
    }
    if let Some(ref fmt) = toml.sink.line_format {
        sink.line_format.clone_from(fmt);
    }
}

/// Apply environment variable overrides to the config
///
/// `lookup` resolves a variable name; production passes `std::env::var`.
/// Unparsable values are ignored with a warning.
pub fn apply_env_config<F>(config: &mut LogdeckConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(
        lookup: &dyn Fn(&str) -> Option<String>,
        name: &str,
    ) -> Option<T> {
        let raw = lookup(name)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(variable = name, value = %raw, "Ignoring unparsable value");
                None
            }
        }
    }

    let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
    let mut touched = false;

    if let Some(n) = parsed(lookup, "LOGDECK_MESSAGE_CAPACITY") {
        config.render.message_capacity = n;
        touched = true;
    }
    if let Some(n) = parsed(lookup, "LOGDECK_EXCEPTION_CAPACITY") {
        config.render.exception_capacity = n;
        touched = true;
    }
    if let Some(n) = parsed(lookup, "LOGDECK_PERMANENT_SLOTS") {
        config.render.permanent_slots = n;
        touched = true;
    }
    if let Some(ms) = parsed(lookup, "LOGDECK_REDRAW_INTERVAL_MS") {
        config.render.redraw_interval = Duration::from_millis(ms);
        touched = true;
    }
    if let Some(level) = parsed(lookup, "LOGDECK_CONSOLE_LEVEL") {
        config.render.console_level = level;
        touched = true;
    }
    if let Some(ms) = parsed(lookup, "LOGDECK_TASK_REMOVAL_DELAY_MS") {
        config.render.task_removal_delay = Duration::from_millis(ms);
        touched = true;
    }
    if let Some(path) = lookup("LOGDECK_LOG_FILE") {
        config.sink.path = PathBuf::from(path);
        touched = true;
    }
    if let Some(level) = parsed(lookup, "LOGDECK_FILE_LEVEL") {
        config.sink.level = level;
        touched = true;
    }
    if let Some(enabled) = lookup("LOGDECK_FILE_LOG") {
        config.sink.enabled = enabled != "0" && enabled.to_lowercase() != "false";
        touched = true;
    }

    if touched {
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Message capacity override
    pub message_capacity: Option<usize>,
    /// Permanent slots override
    pub permanent_slots: Option<usize>,
    /// Redraw interval override (milliseconds)
    pub redraw_interval_ms: Option<u64>,
    /// Console level override
    pub console_level: Option<LogLevel>,
    /// Log file override
    pub log_file: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set message capacity override
    #[must_use]
    pub fn with_message_capacity(mut self, n: usize) -> Self {
        self.message_capacity = Some(n);
        self
    }

    /// Set permanent slots override
    #[must_use]
    pub fn with_permanent_slots(mut self, n: usize) -> Self {
        self.permanent_slots = Some(n);
        self
    }

    /// Set redraw interval override
    #[must_use]
    pub fn with_redraw_interval_ms(mut self, ms: u64) -> Self {
        self.redraw_interval_ms = Some(ms);
        self
    }

    /// Set console level override
    #[must_use]
    pub fn with_console_level(mut self, level: LogLevel) -> Self {
        self.console_level = Some(level);
        self
    }

    /// Set log file override
    #[must_use]
    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut LogdeckConfig) {
        if self.message_capacity.is_some()
            || self.permanent_slots.is_some()
            || self.redraw_interval_ms.is_some()
            || self.console_level.is_some()
            || self.log_file.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(n) = self.message_capacity {
            config.render.message_capacity = n;
        }
        if let Some(n) = self.permanent_slots {
            config.render.permanent_slots = n;
        }
        if let Some(ms) = self.redraw_interval_ms {
            config.render.redraw_interval = Duration::from_millis(ms);
        }
        if let Some(level) = self.console_level {
            config.render.console_level = level;
        }
        if let Some(ref path) = self.log_file {
            config.sink.path.clone_from(path);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
