//! Span replay data source.
//!
//! Reads exported spans from a newline-delimited JSON file and aggregates
//! them locally, so a graph can be inspected without a running collector.
//! A line holding an array is one export batch; lines holding a single span
//! object are gathered into one trailing batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{DataSource, GraphSnapshot, SourceError};
use crate::data::aggregate::{GraphAggregator, SpanEvent};

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum SpanLine {
    Batch(Vec<SpanEvent>),
    Single(SpanEvent),
}

/// A data source that replays a span export file.
#[derive(Debug)]
pub struct SpanReplaySource {
    path: PathBuf,
    description: String,
    aggregator: GraphAggregator,
    window_sec: u64,
    last_modified: Option<SystemTime>,
    dirty: bool,
    last_error: Option<String>,
}

impl SpanReplaySource {
    pub fn new<P: AsRef<Path>>(path: P, window_sec: u64) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("spans: {}", path.display());
        Self {
            path,
            description,
            aggregator: GraphAggregator::default(),
            window_sec,
            last_modified: None,
            dirty: true,
            last_error: None,
        }
    }

    pub fn aggregator(&self) -> &GraphAggregator {
        &self.aggregator
    }

    /// Snapshot of the current window, ending at the newest span.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.aggregator
            .snapshot_at(self.window_sec, self.aggregator.latest_end_ns())
    }

    fn reload(&mut self) -> Result<(), SourceError> {
        let content = fs::read_to_string(&self.path)?;
        let mut aggregator = GraphAggregator::default();
        let mut loose = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SpanLine>(line) {
                Ok(SpanLine::Batch(batch)) => aggregator.ingest(&batch),
                Ok(SpanLine::Single(span)) => loose.push(span),
                Err(e) => {
                    warn!(path = %self.path.display(), line = line_no + 1, error = %e, "skipping span line");
                    skipped += 1;
                }
            }
        }
        aggregator.ingest(&loose);

        debug!(
            path = %self.path.display(),
            buckets = aggregator.bucket_count(),
            skipped,
            "replayed span file"
        );
        self.aggregator = aggregator;
        Ok(())
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }
}

impl DataSource for SpanReplaySource {
    fn poll(&mut self) -> Option<GraphSnapshot> {
        let current_modified = self.modified_time();
        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(current)) => current > last,
        };

        if file_changed {
            match self.reload() {
                Ok(()) => {
                    self.last_error = None;
                    self.last_modified = current_modified;
                    self.dirty = true;
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "failed to replay spans");
                    self.last_error = Some(e.to_string());
                    return None;
                }
            }
        }

        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.snapshot())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn set_window(&mut self, window_sec: u64) {
        if self.window_sec != window_sec {
            self.window_sec = window_sec;
            self.dirty = true;
        }
    }

    fn request_refresh(&mut self) {
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EdgeEntry;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SEC: u64 = 1_000_000_000;

    fn span_json(id: &str, parent: Option<&str>, service: &str, end_secs: u64) -> String {
        let parent = parent.map(|p| format!(r#","parent_span_id":"{}""#, p)).unwrap_or_default();
        format!(
            r#"{{"trace_id":"t","span_id":"{}"{},"service_name":"{}","duration_ms":5.0,"end_time_ns":{}}}"#,
            id,
            parent,
            service,
            end_secs * SEC
        )
    }

    fn write_spans(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_replays_batches_and_loose_spans() {
        let batch = format!(
            "[{},{}]",
            span_json("1", None, "web", 1000),
            span_json("2", Some("1"), "api", 1000)
        );
        let file = write_spans(&[
            batch,
            span_json("3", None, "api", 1000),
            span_json("4", Some("3"), "db", 1000),
            "garbage".to_string(),
        ]);

        let mut source = SpanReplaySource::new(file.path(), 60);
        let snapshot = source.poll().unwrap();
        let pairs: Vec<_> = snapshot
            .edges
            .iter()
            .filter_map(|e| match e {
                EdgeEntry::Edge(edge) => Some((edge.src.to_string(), edge.dst.to_string())),
                EdgeEntry::Malformed(_) => None,
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("api".to_string(), "db".to_string()),
                ("web".to_string(), "api".to_string()),
            ]
        );
        assert_eq!(snapshot.nodes.len(), 3);
        assert!(source.error().is_none());

        // Nothing changed
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_window_change_yields_new_snapshot() {
        let file = write_spans(&[
            format!("[{},{}]", span_json("1", None, "web", 100), span_json("2", Some("1"), "api", 100)),
            format!("[{},{}]", span_json("3", None, "web", 1000), span_json("4", Some("3"), "db", 1000)),
        ]);

        let mut source = SpanReplaySource::new(file.path(), 60);
        assert_eq!(source.poll().unwrap().edges.len(), 1);

        source.set_window(3600);
        assert_eq!(source.poll().unwrap().edges.len(), 2);

        source.set_window(3600);
        assert!(source.poll().is_none());

        source.request_refresh();
        assert!(source.poll().is_some());
    }

    #[test]
    fn test_missing_file() {
        let mut source = SpanReplaySource::new("/nonexistent/spans.ndjson", 60);
        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }
}
