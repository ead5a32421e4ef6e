//! Producer Facade
//!
//! Thin convenience layer over [`CommandSender`]. A [`Logger`] is cheap to
//! clone; give one to every thread or task that produces output.
//!
//! ```ignore
//! let logger = Logger::new(tx);
//! logger.info("starting")?;
//!
//! for item in items.track(&logger, "items")? {
//!     process(item);
//! }
//! ```

use crate::commands::{Command, LogLevel, ProducerId, TaskKey, TaskSpec};
use crate::config::RenderConfig;
use crate::transport::{CommandSender, TransportError};

/// Producer handle bound to one command channel
#[derive(Clone, Debug)]
pub struct Logger {
    sender: CommandSender,
    producer: ProducerId,
}

impl Logger {
    /// Create a logger identifying itself by the current process and thread
    #[must_use]
    pub fn new(sender: CommandSender) -> Self {
        Self {
            sender,
            producer: ProducerId::current(),
        }
    }

    /// Override the producer identity attached to exception reports
    #[must_use]
    pub fn with_producer(mut self, producer: ProducerId) -> Self {
        self.producer = producer;
        self
    }

    /// Producer identity attached to exception reports
    #[must_use]
    pub fn producer(&self) -> &ProducerId {
        &self.producer
    }

    /// Underlying sender
    #[must_use]
    pub fn sender(&self) -> &CommandSender {
        &self.sender
    }

    /// Post a message at `level`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn log(&self, level: LogLevel, text: impl Into<String>) -> Result<(), TransportError> {
        self.sender.send(Command::LogMessage {
            text: text.into(),
            level,
        })
    }

    /// Post a debug message
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn debug(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.log(LogLevel::Debug, text)
    }

    /// Post an info message
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn info(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.log(LogLevel::Info, text)
    }

    /// Post a warning
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn warning(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.log(LogLevel::Warning, text)
    }

    /// Post an error message
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn error(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.log(LogLevel::Error, text)
    }

    /// Post a critical message
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn critical(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.log(LogLevel::Critical, text)
    }

    /// Report a captured error or trace, optionally labelled
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn exception(
        &self,
        text: impl Into<String>,
        label: Option<&str>,
    ) -> Result<(), TransportError> {
        self.sender.send(Command::Exception {
            producer: self.producer.clone(),
            text: text.into(),
            label: label.map(str::to_string),
        })
    }

    /// Create a task under a freshly generated key
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn new_task(&self, spec: TaskSpec) -> Result<TaskKey, TransportError> {
        let key = TaskKey::generate();
        self.new_task_with_key(key.clone(), spec)?;
        Ok(key)
    }

    /// Create (or replace) a task under a caller-chosen key
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn new_task_with_key(&self, key: TaskKey, spec: TaskSpec) -> Result<(), TransportError> {
        self.sender.send(Command::NewTask { key, spec })
    }

    /// Set a task's progress
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn update(&self, key: &TaskKey, progress: i64) -> Result<(), TransportError> {
        self.sender.send(Command::UpdateProgress {
            key: key.clone(),
            progress,
        })
    }

    /// Replace the renderer's configuration
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn configure(&self, config: RenderConfig) -> Result<(), TransportError> {
        self.sender.send(Command::SetConfiguration { config })
    }

    /// Change the console level, and the durable sink's unless `console_only`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn set_level(&self, level: LogLevel, console_only: bool) -> Result<(), TransportError> {
        self.sender.send(Command::SetLevel {
            level,
            console_only,
        })
    }

    /// Ask for an immediate repaint
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn flush(&self) -> Result<(), TransportError> {
        self.sender.send(Command::Flush)
    }

    /// Stop the render server; commands queued behind this one are dropped
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn shutdown(&self) -> Result<(), TransportError> {
        self.sender.send(Command::Shutdown)
    }
}

// =============================================================================
// Iterator tracking
// =============================================================================

/// Iterator adapter reporting progress as items are yielded
///
/// When the task was created without a total, the total is fixed to the
/// number of yielded items once the inner iterator is exhausted, so the task
/// completes and becomes eligible for removal.
///
/// Send failures after creation are ignored: the iteration itself never
/// depends on the render server being alive.
#[derive(Debug)]
pub struct ProgressIter<I> {
    inner: I,
    logger: Logger,
    key: TaskKey,
    count: i64,
    /// Spec to re-send with a resolved total; `None` once the total is known
    unresolved: Option<TaskSpec>,
}

impl<I> ProgressIter<I> {
    /// Key of the task this iterator drives
    #[must_use]
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Replace the task with one whose total is the final count
    fn resolve_total(&mut self) {
        let Some(mut spec) = self.unresolved.take() else {
            return;
        };
        spec.total = Some(u64::try_from(self.count).unwrap_or(0));
        let _ = self.logger.new_task_with_key(self.key.clone(), spec);
        let _ = self.logger.update(&self.key, self.count);
    }
}

impl<I: Iterator> Iterator for ProgressIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(item) = self.inner.next() else {
            self.resolve_total();
            return None;
        };
        self.count += 1;
        let _ = self.logger.update(&self.key, self.count);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Wrap any iterator in a progress bar
pub trait TrackProgress: Iterator + Sized {
    /// Track with a prefix; the total comes from an exact size hint if any
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the task cannot be created.
    fn track(self, logger: &Logger, prefix: &str) -> Result<ProgressIter<Self>, TransportError> {
        let spec = match self.size_hint() {
            (lower, Some(upper)) if lower == upper => TaskSpec::new(lower as u64),
            _ => TaskSpec::unbounded(),
        };
        self.track_with(logger, spec.with_prefix(prefix))
    }

    /// Track with explicit task attributes
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the task cannot be created.
    fn track_with(
        self,
        logger: &Logger,
        spec: TaskSpec,
    ) -> Result<ProgressIter<Self>, TransportError> {
        let unresolved = spec.total.is_none().then(|| spec.clone());
        let key = logger.new_task(spec)?;
        Ok(ProgressIter {
            inner: self,
            logger: logger.clone(),
            key,
            count: 0,
            unresolved,
        })
    }
}

impl<I: Iterator> TrackProgress for I {}
