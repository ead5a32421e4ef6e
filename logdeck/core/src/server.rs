//! Render Server - The Dispatch Loop
//!
//! The render server is the single consumer of the command channel and the
//! only owner of renderer state: the task registry, the message and exception
//! rings, the redraw scheduler and the active configuration. Handlers mutate
//! that state one command at a time, so no locking is needed anywhere in the
//! renderer.
//!
//! # State Machine
//!
//! ```text
//!            ┌──────── any command except Shutdown ───────┐
//!            ▼                                            │
//!       ┌─────────┐                                       │
//!  ───▶ │ Running │ ──────────────────────────────────────┘
//!       └────┬────┘
//!            │ Shutdown, or every sender dropped
//!            ▼
//!       ┌──────────┐
//!       │ Shutdown │   commands still queued are never processed
//!       └──────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let (tx, rx) = command_channel();
//! let renderer = Renderer::new(Terminal::stdout(), sink, RenderConfig::default());
//! let handle = RenderServer::new(renderer, rx).start()?;
//!
//! tx.send(Command::LogMessage { text: "hello".into(), level: LogLevel::Info })?;
//! tx.send(Command::Flush)?;
//! tx.send(Command::Shutdown)?;
//! handle.join()?;
//! ```

use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::commands::{Command, LogLevel, ProducerId, TaskKey, TaskSpec};
use crate::config::RenderConfig;
use crate::render::{compose_frame, format_exception, format_message, Frame, Terminal};
use crate::ring::Ring;
use crate::scheduler::RedrawScheduler;
use crate::sink::{DurableSink, SinkRecord};
use crate::tasks::TaskRegistry;
use crate::transport::CommandReceiver;

/// Errors that end the render server
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Writing to the terminal failed
    #[error("terminal write failed: {0}")]
    Terminal(#[from] std::io::Error),

    /// The render thread could not be started
    #[error("failed to spawn render thread: {0}")]
    Spawn(std::io::Error),

    /// The render thread panicked
    #[error("render thread panicked")]
    Panicked,
}

/// Dispatch loop state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Receiving and handling commands
    Running,
    /// Terminal state; the loop has exited or is about to
    Shutdown,
}

/// Counters describing what the renderer has done
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Commands handled, including the final `Shutdown`
    pub commands: u64,
    /// Full-screen repaints performed
    pub repaints: u64,
    /// Tasks purged by removal sweeps
    pub tasks_removed: u64,
}

// =============================================================================
// Renderer state and handlers
// =============================================================================

/// Renderer state plus the handlers that mutate it
pub struct Renderer<W: Write> {
    terminal: Terminal<W>,
    sink: Box<dyn DurableSink>,
    clock: Arc<dyn Clock>,
    config: RenderConfig,
    tasks: TaskRegistry,
    messages: Ring<String>,
    exceptions: Ring<String>,
    scheduler: RedrawScheduler,
    state: LoopState,
    last_frame: Option<Frame>,
    stats: RenderStats,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer using the system clock
    pub fn new(terminal: Terminal<W>, sink: Box<dyn DurableSink>, config: RenderConfig) -> Self {
        Self::with_clock(terminal, sink, config, Arc::new(SystemClock))
    }

    /// Create a renderer reading time from `clock`
    pub fn with_clock(
        terminal: Terminal<W>,
        sink: Box<dyn DurableSink>,
        config: RenderConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            terminal,
            sink,
            clock,
            tasks: TaskRegistry::new(),
            messages: Ring::fifo(config.message_capacity),
            exceptions: Ring::newest_first(config.exception_capacity),
            scheduler: RedrawScheduler::new(config.redraw_interval),
            config,
            state: LoopState::Running,
            last_frame: None,
            stats: RenderStats::default(),
        }
    }

    /// Current loop state
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Task registry
    #[must_use]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Formatted messages, oldest first
    #[must_use]
    pub fn messages(&self) -> &Ring<String> {
        &self.messages
    }

    /// Formatted exceptions, newest first
    #[must_use]
    pub fn exceptions(&self) -> &Ring<String> {
        &self.exceptions
    }

    /// Whether a change is waiting for a repaint
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_dirty()
    }

    /// The frame most recently written to the terminal
    #[must_use]
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Activity counters
    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Borrow the terminal writer
    pub fn terminal(&self) -> &Terminal<W> {
        &self.terminal
    }

    /// Route one command to its handler
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Terminal`] if a repaint fails to write.
    pub fn handle(&mut self, command: Command) -> Result<LoopState, RenderError> {
        self.stats.commands += 1;
        trace!(kind = command.kind(), "Handling command");

        match command {
            Command::LogMessage { text, level } => self.log_message(&text, level)?,
            Command::NewTask { key, spec } => self.new_task(key, spec)?,
            Command::UpdateProgress { key, progress } => self.update_progress(&key, progress)?,
            Command::Exception {
                producer,
                text,
                label,
            } => self.exception(&producer, &text, label.as_deref())?,
            Command::SetConfiguration { config } => self.set_configuration(config),
            Command::SetLevel {
                level,
                console_only,
            } => self.set_level(level, console_only),
            Command::Flush => self.flush()?,
            Command::Shutdown => {
                info!("Shutdown requested");
                self.state = LoopState::Shutdown;
            }
        }

        Ok(self.state)
    }

    fn log_message(&mut self, text: &str, level: LogLevel) -> Result<(), RenderError> {
        let timestamp = self.clock.wall();

        self.forward(SinkRecord {
            timestamp,
            level,
            text: text.to_string(),
        });

        if level.passes(self.config.console_level) {
            let line = format_message(&self.config, timestamp, level, text);
            self.messages.push(line);
            self.scheduler.mark_dirty();
            self.try_redraw()?;
        }
        Ok(())
    }

    fn new_task(&mut self, key: TaskKey, spec: TaskSpec) -> Result<(), RenderError> {
        debug!(task = %key, total = ?spec.total, "New task");
        self.tasks.upsert(key, spec, self.clock.now());
        self.scheduler.mark_dirty();
        self.try_redraw()
    }

    fn update_progress(&mut self, key: &TaskKey, progress: i64) -> Result<(), RenderError> {
        if self.tasks.apply_progress(key, progress, self.clock.now()) {
            self.scheduler.mark_dirty();
            self.try_redraw()?;
        } else if !self.tasks.contains(key) {
            trace!(task = %key, "Ignoring update for unknown task");
        }
        Ok(())
    }

    fn exception(
        &mut self,
        producer: &ProducerId,
        text: &str,
        label: Option<&str>,
    ) -> Result<(), RenderError> {
        let timestamp = self.clock.wall();
        let entry = format_exception(&self.config, timestamp, producer, label, text);

        self.forward(SinkRecord {
            timestamp,
            level: LogLevel::Critical,
            text: entry.clone(),
        });

        self.exceptions.push(entry);
        self.scheduler.mark_dirty();
        self.try_redraw()
    }

    fn set_configuration(&mut self, config: RenderConfig) {
        info!(
            message_capacity = config.message_capacity,
            exception_capacity = config.exception_capacity,
            redraw_interval_ms = u64::try_from(config.redraw_interval.as_millis()).unwrap_or(u64::MAX),
            "Applying configuration"
        );
        self.messages.resize(config.message_capacity);
        self.exceptions.resize(config.exception_capacity);
        self.scheduler.set_interval(config.redraw_interval);
        self.config = config;
    }

    fn set_level(&mut self, level: LogLevel, console_only: bool) {
        debug!(%level, console_only, "Setting level");
        self.config.console_level = level;
        if !console_only {
            self.sink.set_level(level);
        }
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.scheduler.force();
        self.try_redraw()
    }

    fn forward(&mut self, record: SinkRecord) {
        if let Err(e) = self.sink.record(&record) {
            warn!(error = %e, "Durable sink rejected a record");
        }
    }

    /// Repaint if the scheduler gate is open
    fn try_redraw(&mut self) -> Result<(), RenderError> {
        let now = self.clock.now();
        if !self.scheduler.should_redraw(now) {
            trace!("Redraw deferred");
            return Ok(());
        }
        self.repaint(now)
    }

    fn repaint(&mut self, now: Instant) -> Result<(), RenderError> {
        let removed = self.tasks.sweep(now, self.config.task_removal_delay);
        if !removed.is_empty() {
            debug!(count = removed.len(), "Removed completed tasks");
            self.stats.tasks_removed += removed.len() as u64;
        }

        let frame = compose_frame(
            &self.tasks,
            &self.messages,
            &self.exceptions,
            self.config.permanent_slots,
            now,
        );
        self.terminal.repaint(&frame)?;
        self.last_frame = Some(frame);
        self.stats.repaints += 1;
        Ok(())
    }
}

// =============================================================================
// Server lifecycle
// =============================================================================

/// A renderer bound to the receiving end of the command channel
pub struct RenderServer<W: Write> {
    renderer: Renderer<W>,
    receiver: CommandReceiver,
}

impl<W: Write + Send + 'static> RenderServer<W> {
    /// Bind a renderer to a channel
    pub fn new(renderer: Renderer<W>, receiver: CommandReceiver) -> Self {
        Self { renderer, receiver }
    }

    /// Run the dispatch loop on the current thread until shutdown
    ///
    /// Must not be called from inside an async runtime. Returns the renderer so
    /// its final state can be inspected.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Terminal`] if writing to the terminal fails.
    pub fn run(mut self) -> Result<Renderer<W>, RenderError> {
        info!("Render server started");

        while self.renderer.state() == LoopState::Running {
            let Some(command) = self.receiver.blocking_recv() else {
                info!("All producers disconnected");
                self.renderer.state = LoopState::Shutdown;
                break;
            };
            self.renderer.handle(command)?;
        }

        let stats = self.renderer.stats();
        info!(
            commands = stats.commands,
            repaints = stats.repaints,
            "Render server stopped"
        );
        Ok(self.renderer)
    }

    /// Run the dispatch loop on a dedicated thread
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Spawn`] if the thread cannot be created.
    pub fn start(self) -> Result<RenderHandle<W>, RenderError> {
        let thread = std::thread::Builder::new()
            .name("logdeck-render".to_string())
            .spawn(move || self.run())
            .map_err(RenderError::Spawn)?;
        Ok(RenderHandle { thread })
    }
}

/// Handle to a render server running on its own thread
pub struct RenderHandle<W: Write> {
    thread: JoinHandle<Result<Renderer<W>, RenderError>>,
}

impl<W: Write> RenderHandle<W> {
    /// Whether the dispatch loop has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the dispatch loop to exit
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop, or [`RenderError::Panicked`].
    pub fn join(self) -> Result<Renderer<W>, RenderError> {
        self.thread.join().map_err(|_| RenderError::Panicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sink::MemorySink;
    use std::time::Duration;

    fn quiet_config() -> RenderConfig {
        RenderConfig {
            message_format: "{text}".to_string(),
            exception_format: "{text}".to_string(),
            redraw_interval: Duration::from_millis(100),
            ..RenderConfig::default()
        }
    }

    fn renderer(config: RenderConfig) -> (Renderer<Vec<u8>>, ManualClock, MemorySink) {
        let clock = ManualClock::new();
        let sink = MemorySink::new();
        let renderer = Renderer::with_clock(
            Terminal::new(Vec::new()),
            Box::new(sink.clone()),
            config,
            Arc::new(clock.clone()),
        );
        (renderer, clock, sink)
    }

    fn log(text: &str, level: LogLevel) -> Command {
        Command::LogMessage {
            text: text.to_string(),
            level,
        }
    }

    #[test]
    fn test_first_command_paints() {
        let (mut r, _clock, _sink) = renderer(quiet_config());
        r.handle(log("hello", LogLevel::Info)).unwrap();

        assert_eq!(r.stats().repaints, 1);
        assert!(r.last_frame().unwrap().contains("hello"));
        assert!(!r.is_dirty());
    }

    #[test]
    fn test_updates_within_interval_are_deferred() {
        let (mut r, clock, _sink) = renderer(quiet_config());
        r.handle(log("one", LogLevel::Info)).unwrap();
        clock.advance(Duration::from_millis(10));
        r.handle(log("two", LogLevel::Info)).unwrap();

        assert_eq!(r.stats().repaints, 1);
        assert!(r.is_dirty());
        assert!(!r.last_frame().unwrap().contains("two"));

        clock.advance(Duration::from_millis(200));
        r.handle(log("three", LogLevel::Info)).unwrap();
        assert_eq!(r.stats().repaints, 2);
        assert!(r.last_frame().unwrap().contains("two"));
    }

    #[test]
    fn test_flush_bypasses_interval() {
        let (mut r, _clock, _sink) = renderer(RenderConfig {
            redraw_interval: Duration::from_secs(3600),
            ..quiet_config()
        });
        r.handle(log("one", LogLevel::Info)).unwrap();
        r.handle(log("two", LogLevel::Info)).unwrap();
        assert!(!r.last_frame().unwrap().contains("two"));

        r.handle(Command::Flush).unwrap();
        assert!(r.last_frame().unwrap().contains("two"));
    }

    #[test]
    fn test_console_filter_still_forwards_to_sink() {
        let (mut r, _clock, sink) = renderer(quiet_config());
        r.handle(log("verbose", LogLevel::Debug)).unwrap();

        assert!(r.messages().is_empty());
        assert!(!r.is_dirty());
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Debug);
        assert_eq!(records[0].text, "verbose");
    }

    #[test]
    fn test_noop_progress_does_not_dirty() {
        let (mut r, clock, _sink) = renderer(quiet_config());
        let key = TaskKey::new("t");
        r.handle(Command::NewTask {
            key: key.clone(),
            spec: TaskSpec::new(10),
        })
        .unwrap();
        r.handle(Command::UpdateProgress {
            key: key.clone(),
            progress: 3,
        })
        .unwrap();
        clock.advance(Duration::from_secs(1));
        r.handle(Command::Flush).unwrap();
        let repaints = r.stats().repaints;

        clock.advance(Duration::from_secs(1));
        r.handle(Command::UpdateProgress { key, progress: 3 })
            .unwrap();

        assert!(!r.is_dirty());
        assert_eq!(r.stats().repaints, repaints);
    }

    #[test]
    fn test_exception_is_critical_in_sink() {
        let (mut r, _clock, sink) = renderer(quiet_config());
        r.handle(Command::Exception {
            producer: ProducerId::new("7"),
            text: "Traceback: boom".to_string(),
            label: Some("worker".to_string()),
        })
        .unwrap();

        assert_eq!(r.exceptions().len(), 1);
        let records = sink.records();
        assert_eq!(records[0].level, LogLevel::Critical);
        assert!(records[0].text.contains("boom"));
    }

    #[test]
    fn test_set_level_console_only() {
        let (mut r, _clock, sink) = renderer(quiet_config());
        r.handle(Command::SetLevel {
            level: LogLevel::Error,
            console_only: true,
        })
        .unwrap();
        assert_eq!(r.config().console_level, LogLevel::Error);
        assert_eq!(sink.level(), LogLevel::Debug);

        r.handle(Command::SetLevel {
            level: LogLevel::Warning,
            console_only: false,
        })
        .unwrap();
        assert_eq!(r.config().console_level, LogLevel::Warning);
        assert_eq!(sink.level(), LogLevel::Warning);
    }

    #[test]
    fn test_set_configuration_keeps_newest_messages() {
        let (mut r, _clock, _sink) = renderer(RenderConfig {
            message_capacity: 5,
            ..quiet_config()
        });
        for text in ["1", "2", "3", "4", "5"] {
            r.handle(log(text, LogLevel::Info)).unwrap();
        }

        r.handle(Command::SetConfiguration {
            config: RenderConfig {
                message_capacity: 2,
                ..quiet_config()
            },
        })
        .unwrap();

        let kept: Vec<_> = r.messages().iter().cloned().collect();
        assert_eq!(kept, vec!["4".to_string(), "5".to_string()]);
    }

    #[test]
    fn test_shutdown_transitions_state() {
        let (mut r, _clock, _sink) = renderer(quiet_config());
        assert_eq!(r.state(), LoopState::Running);
        assert_eq!(r.handle(Command::Shutdown).unwrap(), LoopState::Shutdown);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_terminal_failure_is_fatal() {
        let mut r = Renderer::new(
            Terminal::new(BrokenPipe),
            Box::new(MemorySink::new()),
            quiet_config(),
        );
        let result = r.handle(log("doomed", LogLevel::Info));
        assert!(matches!(result, Err(RenderError::Terminal(_))));
    }

    #[test]
    fn test_sink_receives_records_when_terminal_fails() {
        let commands = [
            log("kept", LogLevel::Warning),
            Command::Exception {
                producer: ProducerId::new("9"),
                text: "disk full".to_string(),
                label: None,
            },
        ];

        for command in commands {
            let sink = MemorySink::new();
            let mut r = Renderer::new(
                Terminal::new(BrokenPipe),
                Box::new(sink.clone()),
                quiet_config(),
            );
            assert!(r.handle(command).is_err());
            assert_eq!(sink.records().len(), 1);
        }
    }
}
