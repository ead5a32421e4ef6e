//! Logdeck Core - Shared Terminal Rendering for Concurrent Producers
//!
//! Many producers (threads, async tasks, child processes) want to draw
//! progress bars, log lines and error reports on one terminal. Letting each of
//! them write directly interleaves their output. This crate routes everything
//! through a single render server that owns the screen.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Producers                             │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌───────────────┐  │
//! │  │ thread A │  │ thread B │  │ tokio    │  │ child process │  │
//! │  │ (Logger) │  │ (Logger) │  │ task     │  │ (encoded)     │  │
//! │  └────┬─────┘  └────┬─────┘  └────┬─────┘  └───────┬───────┘  │
//! │       └─────────────┴──────┬──────┴────────────────┘          │
//! │                        Command                                │
//! └────────────────────────────┼──────────────────────────────────┘
//!                              │ one unbounded channel
//! ┌────────────────────────────┼──────────────────────────────────┐
//! │                     RENDER SERVER                             │
//! │  ┌─────────────────────────┴───────────────────────────────┐  │
//! │  │                       Renderer                          │  │
//! │  │  ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌───────────┐ │  │
//! │  │  │  Task    │ │ Message  │ │ Exception  │ │  Redraw   │ │  │
//! │  │  │ Registry │ │  Ring    │ │   Ring     │ │ Scheduler │ │  │
//! │  │  └──────────┘ └──────────┘ └────────────┘ └───────────┘ │  │
//! │  └──────────┬──────────────────────────────────┬───────────┘  │
//! │             ▼                                  ▼              │
//! │        Terminal (crossterm)             DurableSink (file)    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Command`]: Everything a producer can ask of the renderer
//! - [`Logger`]: Producer-side convenience handle
//! - [`RenderServer`]: The dispatch loop, run on its own thread
//! - [`RenderConfig`]: Runtime tunables, replaceable with `SetConfiguration`
//!
//! # Quick Start
//!
//! ```ignore
//! use logdeck_core::{command_channel, Logger, NullSink, RenderConfig, RenderServer, Renderer, Terminal};
//!
//! let (tx, rx) = command_channel();
//! let renderer = Renderer::new(Terminal::stdout(), Box::new(NullSink::default()), RenderConfig::default());
//! let handle = RenderServer::new(renderer, rx).start()?;
//!
//! let logger = Logger::new(tx);
//! logger.info("hello")?;
//! logger.shutdown()?;
//! handle.join()?;
//! ```
//!
//! # Module Overview
//!
//! - [`commands`]: Command enum, identifiers, levels and task attributes
//! - [`transport`]: The command channel
//! - [`server`]: Renderer state, handlers and the dispatch loop
//! - [`tasks`]: Task registry and task lifecycle
//! - [`ring`]: Bounded rings for messages and exceptions
//! - [`scheduler`]: Redraw throttling
//! - [`render`]: Frame layout, line formatting and terminal output
//! - [`sink`]: Durable log sinks
//! - [`config`]: Configuration loading (TOML, environment, overrides)
//! - [`clock`]: Time sources
//! - [`facade`]: Producer helpers and iterator tracking

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod commands;
pub mod config;
pub mod facade;
pub mod render;
pub mod ring;
pub mod scheduler;
pub mod server;
pub mod sink;
pub mod tasks;
pub mod transport;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{
    Command, CommandCodecError, LogLevel, ParseLevelError, ProducerId, TaskKey, TaskSpec,
};
pub use facade::{Logger, ProgressIter, TrackProgress};
pub use render::{Frame, Terminal};
pub use ring::{Ring, RingOrder};
pub use scheduler::RedrawScheduler;
pub use server::{LoopState, RenderError, RenderHandle, RenderServer, RenderStats, Renderer};
pub use sink::{DurableSink, MemorySink, NullSink, RotatingFileSink, SinkRecord};
pub use tasks::{Task, TaskPhase, TaskRegistry};
pub use transport::{command_channel, CommandReceiver, CommandSender, TransportError};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, LogdeckConfig, LogdeckToml, RenderConfig, SinkConfig,
};
