//! Stream-based data source.
//!
//! Receives graph snapshots from an async byte stream, such as a TCP
//! connection to a collector that pushes newline-delimited JSON.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{DataSource, ErrorSlot, GraphSnapshot, SourceError};

/// A data source that receives graph snapshots from an async stream.
///
/// This source spawns a background task that reads newline-delimited JSON
/// from the provided async reader and makes snapshots available via `poll()`.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use depviz::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"nodes\":[],\"edges\":[]}\n";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<GraphSnapshot>,
    description: String,
    errors: ErrorSlot,
    last_error: Option<String>,
}

impl StreamSource {
    /// Spawn a background task that reads from the given async reader.
    ///
    /// Each non-empty line is parsed as a complete [`GraphSnapshot`]; lines
    /// that fail to parse are skipped.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let errors = ErrorSlot::default();
        let error_handle = errors.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(source = %desc, "stream reached EOF");
                        error_handle.set(SourceError::Closed.to_string());
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<GraphSnapshot>(trimmed) {
                            Ok(snapshot) => {
                                error_handle.clear();
                                if tx.send(snapshot).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                let err = SourceError::from(e);
                                warn!(source = %desc, error = %err, "skipping unparsable line");
                                error_handle.set(err.to_string());
                            }
                        }
                    }
                    Err(e) => {
                        let err = SourceError::from(e);
                        warn!(source = %desc, error = %err, "stream read failed");
                        error_handle.set(err.to_string());
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            errors,
            last_error: None,
        }
    }

    /// Create a StreamSource from a channel of raw JSON payloads.
    ///
    /// Each message is one complete snapshot.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let (tx, snapshot_rx) = mpsc::channel(16);
        let errors = ErrorSlot::default();
        let error_handle = errors.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match serde_json::from_slice::<GraphSnapshot>(&bytes) {
                    Ok(snapshot) => {
                        error_handle.clear();
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let err = SourceError::from(e);
                        warn!(error = %err, "skipping unparsable payload");
                        error_handle.set(err.to_string());
                    }
                }
            }
        });

        Self {
            receiver: snapshot_rx,
            description: format!("stream: {}", description),
            errors,
            last_error: None,
        }
    }
}

impl DataSource for StreamSource {
    fn poll(&mut self) -> Option<GraphSnapshot> {
        let result = match self.receiver.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                if self.errors.get().is_none() {
                    self.errors.set("Stream disconnected");
                }
                None
            }
        };
        self.last_error = self.errors.get();
        result
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_json() -> &'static str {
        r#"{"nodes":["api"],"edges":[{"src":"web","dst":"api","call_count":3}]}"#
    }

    #[tokio::test]
    async fn test_stream_source_spawn() {
        let data = format!("{}\n", sample_json());
        let cursor = Cursor::new(data);

        let mut source = StreamSource::spawn(cursor, "test");

        // Give the background task time to process
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let snapshot = source.poll().unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_source_multiple_snapshots() {
        let data = format!("{}\n\n{}\n", sample_json(), sample_json());
        let cursor = Cursor::new(data);

        let mut source = StreamSource::spawn(cursor, "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_some());
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let cursor = Cursor::new("");
        let source = StreamSource::spawn(cursor, "tcp://localhost:9090");
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_source_from_bytes_channel() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut source = StreamSource::from_bytes_channel(rx, "test-channel");

        tx.send(sample_json().as_bytes().to_vec()).await.unwrap();

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(source.poll().unwrap().edges.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_source_invalid_json() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut source = StreamSource::from_bytes_channel(rx, "test");

        tx.send(b"not valid json".to_vec()).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }

    #[tokio::test]
    async fn test_stream_source_reports_closed_stream() {
        let cursor = Cursor::new("");
        let mut source = StreamSource::spawn(cursor, "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_none());
        assert_eq!(source.error(), Some("Connection closed"));
    }
}
