//! Render Commands
//!
//! Commands sent from producers to the render server. These are the only way
//! a producer can influence what ends up on the shared terminal.
//!
//! # Design Philosophy
//!
//! Producers never touch renderer state. They build a [`Command`] value and
//! push it onto the command channel; the render server is the single consumer
//! that applies commands in arrival order. The variant set is closed, so the
//! dispatch loop matches exhaustively and a new variant cannot be forgotten.
//!
//! Every command is a self-contained value that can be serialized on its own
//! (see [`Command::encode`]), which lets producers living in other processes of
//! the same process tree forward commands over a pipe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RenderConfig;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque task identifier, stable for the lifetime of a task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey(pub String);

impl TaskKey {
    /// Create a task key from a string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a new unique task key
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("task_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the producer that reported an exception
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerId(pub String);

impl ProducerId {
    /// Create a producer id from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id for the calling thread: `<pid>` or `<pid>/<thread name>`
    #[must_use]
    pub fn current() -> Self {
        let pid = std::process::id();
        match std::thread::current().name() {
            Some(name) => Self(format!("{pid}/{name}")),
            None => Self(pid.to_string()),
        }
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Levels
// =============================================================================

/// Severity of a log message, ordered from least to most severe
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    #[default]
    Info,
    /// Something unexpected, work continues
    Warning,
    /// An operation failed
    Error,
    /// A producer cannot continue
    Critical,
}

impl LogLevel {
    /// Upper-case label used in formatted lines
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Whether a message at `self` passes a filter set to `threshold`
    #[must_use]
    pub fn passes(self, threshold: LogLevel) -> bool {
        self >= threshold
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a level name is not recognized
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

// =============================================================================
// Task specification
// =============================================================================

/// Display and lifecycle attributes of a progress-bar task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Iteration count at completion; `None` while unknown
    pub total: Option<u64>,
    /// Text left of the bar
    #[serde(default)]
    pub prefix: String,
    /// Text after the percentage
    #[serde(default)]
    pub suffix: String,
    /// Percentage precision
    #[serde(default)]
    pub decimals: u8,
    /// Bar width in characters
    pub bar_width: usize,
    /// Never auto-remove the task once complete
    #[serde(default)]
    pub keep_alive: bool,
    /// Show elapsed time next to the bar
    #[serde(default)]
    pub display_elapsed: bool,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            total: None,
            prefix: String::new(),
            suffix: String::new(),
            decimals: 0,
            bar_width: 60,
            keep_alive: false,
            display_elapsed: false,
        }
    }
}

impl TaskSpec {
    /// A task with a known total and default display attributes
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total: Some(total),
            ..Self::default()
        }
    }

    /// A task whose total is not known yet
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set the prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the suffix
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the percentage precision
    #[must_use]
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Set the bar width
    #[must_use]
    pub fn with_bar_width(mut self, bar_width: usize) -> Self {
        self.bar_width = bar_width;
        self
    }

    /// Keep the task on screen after completion
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Show elapsed time
    #[must_use]
    pub fn with_elapsed(mut self, display_elapsed: bool) -> Self {
        self.display_elapsed = display_elapsed;
        self
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Commands from producers to the render server
///
/// Each variant carries only what its handler needs. The render server never
/// synthesizes commands of its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Post a log message
    LogMessage {
        /// Message body
        text: String,
        /// Message severity
        level: LogLevel,
    },

    /// Create a task, replacing any task under the same key
    NewTask {
        /// Task identifier
        key: TaskKey,
        /// Task attributes
        spec: TaskSpec,
    },

    /// Set the current progress of an existing task
    UpdateProgress {
        /// Task identifier
        key: TaskKey,
        /// Iteration count; clamped into range by the renderer
        progress: i64,
    },

    /// Report an exception captured by a producer
    Exception {
        /// Who raised it
        producer: ProducerId,
        /// Captured trace or message, displayed verbatim
        text: String,
        /// Optional human label for the producer
        label: Option<String>,
    },

    /// Replace every runtime tunable
    SetConfiguration {
        /// The new configuration
        config: RenderConfig,
    },

    /// Change the console filter level
    SetLevel {
        /// The new threshold
        level: LogLevel,
        /// Leave the durable sink's level untouched
        console_only: bool,
    },

    /// Repaint now, bypassing the redraw interval
    Flush,

    /// Stop the render server
    Shutdown,
}

/// Error encoding or decoding a command
#[derive(Debug, Error)]
#[error("command codec error: {0}")]
pub struct CommandCodecError(#[from] serde_json::Error);

impl Command {
    /// Short variant name for diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LogMessage { .. } => "log_message",
            Self::NewTask { .. } => "new_task",
            Self::UpdateProgress { .. } => "update_progress",
            Self::Exception { .. } => "exception",
            Self::SetConfiguration { .. } => "set_configuration",
            Self::SetLevel { .. } => "set_level",
            Self::Flush => "flush",
            Self::Shutdown => "shutdown",
        }
    }

    /// Encode as a single JSON line
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String, CommandCodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a command produced by [`Command::encode`]
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid command.
    pub fn decode(line: &str) -> Result<Self, CommandCodecError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
