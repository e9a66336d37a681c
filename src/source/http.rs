//! HTTP polling data source.
//!
//! Fetches `GET <base>/graph?window_sec=N` on a fixed interval, and
//! immediately when a refresh is requested or the window changes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ConnectionStatus, DataSource, ErrorSlot, GraphSnapshot, SourceError, StatusSink};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A data source that polls a collector's graph endpoint.
#[derive(Debug)]
pub struct HttpSource {
    receiver: mpsc::Receiver<GraphSnapshot>,
    window: watch::Sender<u64>,
    refresh: Arc<Notify>,
    description: String,
    errors: ErrorSlot,
    last_error: Option<String>,
    task: JoinHandle<()>,
}

impl HttpSource {
    /// Start polling `base_url`.
    ///
    /// Must be called from within a tokio runtime. Fails only if the HTTP
    /// client cannot be built.
    pub fn spawn(
        base_url: &str,
        window_sec: u64,
        interval: Duration,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let url = graph_url(base_url);

        let (tx, rx) = mpsc::channel(4);
        let (window_tx, mut window_rx) = watch::channel(window_sec);
        let refresh = Arc::new(Notify::new());
        let refresh_handle = refresh.clone();
        let errors = ErrorSlot::default();
        let error_handle = errors.clone();
        let task_url = url.clone();

        let task = tokio::spawn(async move {
            loop {
                let window = *window_rx.borrow_and_update();
                match fetch(&client, &task_url, window).await {
                    Ok(snapshot) => {
                        debug!(url = %task_url, window, entries = snapshot.len(), "fetched snapshot");
                        status.update_status(ConnectionStatus::Connected);
                        error_handle.clear();
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(url = %task_url, error = %e, "snapshot fetch failed");
                        status.update_status(ConnectionStatus::Disconnected);
                        error_handle.set(e.to_string());
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = refresh_handle.notified() => debug!("manual refresh requested"),
                    changed = window_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        info!(url = %url, window_sec, interval = ?interval, "polling graph endpoint");

        Ok(Self {
            receiver: rx,
            window: window_tx,
            refresh,
            description: format!("http: {}", url),
            errors,
            last_error: None,
            task,
        })
    }
}

impl Drop for HttpSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn graph_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/graph") {
        base.to_string()
    } else {
        format!("{}/graph", base)
    }
}

async fn fetch(client: &Client, url: &str, window_sec: u64) -> Result<GraphSnapshot, SourceError> {
    let response = client.get(url).query(&[("window_sec", window_sec)]).send().await?;

    if !response.status().is_success() {
        return Err(SourceError::Http(format!(
            "API returned status {}",
            response.status()
        )));
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl DataSource for HttpSource {
    fn poll(&mut self) -> Option<GraphSnapshot> {
        // Superseded responses are dropped; the newest one wins.
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
