//! Data source abstraction for receiving graph snapshots.
//!
//! This module provides a trait-based abstraction for receiving snapshots
//! from various transports (files, in-memory channels, byte streams, HTTP
//! polling, WebSocket push, or local span replay).

mod channel;
mod error;
mod file;
mod http;
mod snapshot;
mod spans;
mod stream;
mod websocket;

pub use channel::ChannelSource;
pub use error::SourceError;
pub use file::FileSource;
pub use http::HttpSource;
pub use snapshot::{
    EdgeDescriptor, EdgeEntry, GraphSnapshot, NodeDescriptor, NodeEntry, ServiceName,
};
pub use spans::SpanReplaySource;
pub use stream::StreamSource;
pub use websocket::WebSocketSource;

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

/// Trait for receiving graph snapshots from various sources.
///
/// # Example
///
/// ```
/// use depviz::{DataSource, FileSource};
///
/// let mut source = FileSource::new("graph.json");
/// if let Some(snapshot) = source.poll() {
///     println!("Got {} entries", snapshot.len());
/// }
/// ```
pub trait DataSource: Send + Debug {
    /// Poll for the latest snapshot.
    ///
    /// Returns `Some(snapshot)` if new data is available, `None` otherwise.
    /// This method should be non-blocking.
    fn poll(&mut self) -> Option<GraphSnapshot>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Returns the error message if the last acquisition failed.
    fn error(&self) -> Option<&str>;

    /// Change the observation window, in seconds.
    ///
    /// Sources that cannot scope their data to a window ignore this.
    fn set_window(&mut self, _window_sec: u64) {}

    /// Ask for a fresh snapshot as soon as possible.
    fn request_refresh(&mut self) {}
}

/// Transport connectivity as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives connectivity changes from a transport.
pub trait StatusSink: Send + Sync + Debug {
    fn update_status(&self, status: ConnectionStatus);
}

impl StatusSink for watch::Sender<ConnectionStatus> {
    fn update_status(&self, status: ConnectionStatus) {
        self.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }
}

/// Create a status channel starting at `initial`.
pub fn status_channel(
    initial: ConnectionStatus,
) -> (Arc<watch::Sender<ConnectionStatus>>, watch::Receiver<ConnectionStatus>) {
    let (tx, rx) = watch::channel(initial);
    (Arc::new(tx), rx)
}

/// Last error reported by a background task.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorSlot(Arc<Mutex<Option<String>>>);

impl ErrorSlot {
    pub(crate) fn set(&self, message: impl Into<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub(crate) fn clear(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
