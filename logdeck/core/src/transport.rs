//! Command Channel
//!
//! One ordered, unbounded channel carries commands from any number of
//! producers to the render server.
//!
//! # Ordering
//!
//! Commands from one sender arrive in the order they were sent. Commands from
//! different senders interleave in whatever order they reach the channel.
//!
//! # Backpressure
//!
//! There is none: sending never blocks, and a producer that floods the channel
//! faster than the renderer drains it grows memory without bound.

use tokio::sync::mpsc;

use crate::commands::Command;

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The render server is gone (receiver dropped)
    #[error("Render server closed the command channel")]
    Closed,
}

/// Create a connected sender/receiver pair
#[must_use]
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Producer side of the channel; clone one per producer
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    /// Enqueue a command without blocking
    ///
    /// Callable from plain threads and from async tasks alike.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the render server has stopped.
    pub fn send(&self, command: Command) -> Result<(), TransportError> {
        self.tx.send(command).map_err(|_| TransportError::Closed)
    }

    /// Whether the render server has stopped receiving
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the channel, owned by the render server
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandReceiver {
    /// Wait for the next command on a plain (non-async) thread
    ///
    /// Returns `None` once every sender has been dropped.
    ///
    /// # Panics
    ///
    /// Panics if called from inside an async runtime; the render server only
    /// calls it from its own thread.
    pub fn blocking_recv(&mut self) -> Option<Command> {
        self.rx.blocking_recv()
    }

    /// Wait for the next command from async code
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// Take a command if one is already queued
    pub fn try_recv(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new commands; queued ones can still be received
    pub fn close(&mut self) {
        self.rx.close();
    }
}
