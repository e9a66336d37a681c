//! WebSocket push data source.
//!
//! The collector pushes one JSON snapshot per text frame. The client tells
//! it which observation window to aggregate with a `window:<seconds>` text
//! frame, sent on every connect and whenever the window changes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{ConnectionStatus, DataSource, ErrorSlot, GraphSnapshot, SourceError, StatusSink};

/// The control frame selecting the observation window.
pub fn window_message(window_sec: u64) -> String {
    format!("window:{}", window_sec)
}

/// A data source fed by a collector's WebSocket.
///
/// On close or error the status goes to disconnected and the source
/// reconnects after a fixed backoff.
#[derive(Debug)]
pub struct WebSocketSource {
    receiver: mpsc::Receiver<GraphSnapshot>,
    window: watch::Sender<u64>,
    refresh: Arc<Notify>,
    description: String,
    errors: ErrorSlot,
    last_error: Option<String>,
    task: JoinHandle<()>,
}

impl WebSocketSource {
    /// Connect to `url` in the background. Must be called from within a
    /// tokio runtime.
    pub fn spawn(
        url: &str,
        window_sec: u64,
        backoff: Duration,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let (window_tx, window_rx) = watch::channel(window_sec);
        let refresh = Arc::new(Notify::new());
        let errors = ErrorSlot::default();

        let session = Session {
            url: url.to_string(),
            tx,
            window: window_rx,
            refresh: refresh.clone(),
            errors: errors.clone(),
            status,
        };
        let task = tokio::spawn(session.run(backoff));

        Self {
            receiver: rx,
            window: window_tx,
            refresh,
            description: format!("ws: {}", url),
            errors,
            last_error: None,
            task,
        }
    }
}

impl Drop for WebSocketSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// How a connection ended.
enum Outcome {
    /// Reconnect after the backoff.
    Reconnect,
    /// The source is gone.
    Stop,
}

struct Session {
    url: String,
    tx: mpsc::Sender<GraphSnapshot>,
    window: watch::Receiver<u64>,
    refresh: Arc<Notify>,
    errors: ErrorSlot,
    status: Arc<dyn StatusSink>,
}

impl Session {
    async fn run(mut self, backoff: Duration) {
        loop {
            let outcome = match self.connect_once().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "websocket failed");
                    self.errors.set(e.to_string());
                    Outcome::Reconnect
                }
            };
            self.status.update_status(ConnectionStatus::Disconnected);

            if let Outcome::Stop = outcome {
                break;
            }
            debug!(url = %self.url, backoff = ?backoff, "reconnecting after backoff");
            tokio::time::sleep(backoff).await;
        }
    }

    async fn connect_once(&mut self) -> Result<Outcome, SourceError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        info!(url = %self.url, "websocket connected");
        self.status.update_status(ConnectionStatus::Connected);
        self.errors.clear();

        let (mut write, mut read) = ws_stream.split();

        let window = *self.window.borrow_and_update();
        write.send(Message::Text(window_message(window).into())).await?;

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GraphSnapshot>(&text) {
                            Ok(snapshot) => {
                                if self.tx.send(snapshot).await.is_err() {
                                    return Ok(Outcome::Stop);
                                }
                            }
                            Err(e) => {
                                let err = SourceError::from(e);
                                warn!(url = %self.url, error = %err, "skipping unparsable frame");
                                self.errors.set(err.to_string());
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(url = %self.url, frame = ?frame, "websocket closed by peer");
                        return Err(SourceError::Closed);
                    }
                    // Pongs are sent automatically
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(SourceError::Closed),
                },
                changed = self.window.changed() => {
                    if changed.is_err() {
                        return Ok(Outcome::Stop);
                    }
                    let window = *self.window.borrow_and_update();
                    debug!(window, "sending window change");
                    write.send(Message::Text(window_message(window).into())).await?;
                }
                _ = self.refresh.notified() => {
                    // Re-announcing the window makes the collector push now.
                    let window = *self.window.borrow();
                    write.send(Message::Text(window_message(window).into())).await?;
                }
            }
        }
    }
}

impl DataSource for WebSocketSource {
    fn poll(&mut self) -> Option<GraphSnapshot> {
        let mut latest = None;
        while let Ok(snapshot) = self.receiver.try_recv() {
            latest = Some(snapshot);
        }
        self.last_error = self.errors.get();
        latest
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn set_window(&mut self, window_sec: u64) {
        self.window.send_if_modified(|current| {
            let changed = *current != window_sec;
            *current = window_sec;
            changed
        });
    }

    fn request_refresh(&mut self) {
        self.refresh.notify_one();
    }
}
