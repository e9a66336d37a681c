//! Span aggregation into graph snapshots.
//!
//! Spans are grouped per batch: a span whose parent span belongs to another
//! service is one call on the edge `parent service -> service`. Calls are
//! counted in fixed-width time buckets keyed by the span's end time, and a
//! snapshot merges every bucket inside the requested window.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::source::{EdgeDescriptor, GraphSnapshot, NodeDescriptor};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Default bucket width in seconds.
pub const DEFAULT_BUCKET_SECS: u64 = 60;

/// Default number of buckets kept before the oldest are evicted.
pub const DEFAULT_RETENTION_BUCKETS: usize = 1800;

/// A finished span as exported by a tracer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub duration_ms: f64,
    pub end_time_ns: u64,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub parent_service: String,
    pub child_service: String,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeStats {
    pub call_count: u64,
    pub error_count: u64,
    pub durations: Vec<f64>,
}

impl EdgeStats {
    fn merge(&mut self, other: &EdgeStats) {
        self.call_count += other.call_count;
        self.error_count += other.error_count;
        self.durations.extend_from_slice(&other.durations);
    }

    /// 95th percentile of recorded durations, rounded to 2 decimals.
    pub fn p95(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let mut sorted = self.durations.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((sorted.len() as f64) * 0.95) as usize;
        let p95 = sorted[idx.min(sorted.len() - 1)];
        (p95 * 100.0).round() / 100.0
    }
}

/// Time-bucketed edge statistics.
#[derive(Debug, Clone)]
pub struct GraphAggregator {
    bucket_ns: u64,
    retention_buckets: usize,
    buckets: BTreeMap<u64, HashMap<EdgeKey, EdgeStats>>,
    latest_end_ns: u64,
}

impl Default for GraphAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SECS, DEFAULT_RETENTION_BUCKETS)
    }
}

impl GraphAggregator {
    pub fn new(bucket_secs: u64, retention_buckets: usize) -> Self {
        Self {
            bucket_ns: bucket_secs.max(1) * NANOS_PER_SEC,
            retention_buckets,
            buckets: BTreeMap::new(),
            latest_end_ns: 0,
        }
    }

    /// Number of buckets currently held.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Latest span end time seen, in nanoseconds since the epoch.
    pub fn latest_end_ns(&self) -> u64 {
        self.latest_end_ns
    }

    /// Record one batch of spans.
    ///
    /// Parent lookups only see spans in the same batch.
    pub fn ingest(&mut self, spans: &[SpanEvent]) {
        if spans.is_empty() {
            return;
        }

        let span_to_service: HashMap<&str, &str> =
            spans.iter().map(|s| (s.span_id.as_str(), s.service_name.as_str())).collect();

        for span in spans {
            self.latest_end_ns = self.latest_end_ns.max(span.end_time_ns);

            let Some(parent_service) = span
                .parent_span_id
                .as_deref()
                .and_then(|parent| span_to_service.get(parent))
            else {
                continue;
            };
            if *parent_service == span.service_name {
                continue;
            }

            let key = EdgeKey {
                parent_service: parent_service.to_string(),
                child_service: span.service_name.clone(),
            };
            trace!(parent = %key.parent_service, child = %key.child_service, "edge call");

            let bucket_id = span.end_time_ns / self.bucket_ns;
            let stats = self.buckets.entry(bucket_id).or_default().entry(key).or_default();
            stats.call_count += 1;
            stats.durations.push(span.duration_ms);
            if span.is_error {
                stats.error_count += 1;
            }
        }

        self.evict_old_buckets();
    }

    fn evict_old_buckets(&mut self) {
        while self.buckets.len() > self.retention_buckets {
            self.buckets.pop_first();
        }
    }

    /// Snapshot of the last `window_secs` seconds ending at `now_ns`.
    ///
    /// Edges are sorted by `(src, dst)`. Every edge endpoint becomes a node,
    /// sorted by name, carrying the calls and errors it served.
    pub fn snapshot_at(&self, window_secs: u64, now_ns: u64) -> GraphSnapshot {
        let start_ns = now_ns.saturating_sub(window_secs.saturating_mul(NANOS_PER_SEC));
        let start_bucket = start_ns / self.bucket_ns;

        let mut combined: BTreeMap<&EdgeKey, EdgeStats> = BTreeMap::new();
        for (_, edges) in self.buckets.range(start_bucket..) {
            for (key, stats) in edges {
                combined.entry(key).or_default().merge(stats);
            }
        }

        let mut names: BTreeSet<&str> = BTreeSet::new();
        let mut served: HashMap<&str, (u64, u64)> = HashMap::new();
        for (key, stats) in &combined {
            names.insert(&key.parent_service);
            names.insert(&key.child_service);
            let entry = served.entry(key.child_service.as_str()).or_default();
            entry.0 += stats.call_count;
            entry.1 += stats.error_count;
        }

        let nodes = names
            .into_iter()
            .map(|name| {
                let (calls, errors) = served.get(name).copied().unwrap_or_default();
                NodeDescriptor::new(name, calls, errors).into()
            })
            .collect();

        let edges = combined
            .iter()
            .map(|(key, stats)| {
                EdgeDescriptor::new(
                    key.parent_service.as_str(),
                    key.child_service.as_str(),
                    stats.call_count,
                    stats.error_count,
                    stats.p95(),
                )
                .into()
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{EdgeEntry, NodeEntry};

    fn span(
        span_id: &str,
        parent: Option<&str>,
        service: &str,
        duration_ms: f64,
        end_secs: u64,
        is_error: bool,
    ) -> SpanEvent {
        SpanEvent {
            trace_id: "t1".to_string(),
            span_id: span_id.to_string(),
            parent_span_id: parent.map(str::to_string),
            service_name: service.to_string(),
            duration_ms,
            end_time_ns: end_secs * NANOS_PER_SEC,
            is_error,
        }
    }

    fn edges(snapshot: &GraphSnapshot) -> Vec<&EdgeDescriptor> {
        snapshot
            .edges
            .iter()
            .filter_map(|e| match e {
                EdgeEntry::Edge(edge) => Some(edge),
                EdgeEntry::Malformed(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_cross_service_parent_creates_edge() {
        let mut agg = GraphAggregator::new(10, 60);
        agg.ingest(&[
            span("1", None, "frontend", 120.0, 100, false),
            span("2", Some("1"), "checkout", 80.0, 100, false),
            span("3", Some("2"), "checkout", 10.0, 100, false),
            span("4", Some("2"), "payments", 30.0, 100, true),
        ]);

        let snapshot = agg.snapshot_at(60, 100 * NANOS_PER_SEC);
        let edges = edges(&snapshot);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].src.as_str(), "checkout");
        assert_eq!(edges[0].dst.as_str(), "payments");
        assert_eq!(edges[0].error_count, 1);
        assert_eq!(edges[1].src.as_str(), "frontend");
        assert_eq!(edges[1].dst.as_str(), "checkout");
        assert_eq!(edges[1].call_count, 1);
    }

    #[test]
    fn test_nodes_carry_served_calls() {
        let mut agg = GraphAggregator::new(10, 60);
        agg.ingest(&[
            span("1", None, "frontend", 1.0, 100, false),
            span("2", Some("1"), "checkout", 1.0, 100, true),
            span("3", Some("1"), "checkout", 1.0, 100, false),
        ]);

        let snapshot = agg.snapshot_at(60, 100 * NANOS_PER_SEC);
        assert_eq!(
            snapshot.nodes,
            vec![
                NodeEntry::Rich(NodeDescriptor::new("checkout", 2, 1)),
                NodeEntry::Rich(NodeDescriptor::new("frontend", 0, 0)),
            ]
        );
    }

    #[test]
    fn test_parent_outside_batch_is_ignored() {
        let mut agg = GraphAggregator::new(10, 60);
        agg.ingest(&[span("1", None, "a", 1.0, 100, false)]);
        agg.ingest(&[span("2", Some("1"), "b", 1.0, 100, false)]);
        assert!(agg.snapshot_at(60, 100 * NANOS_PER_SEC).is_empty());
    }

    #[test]
    fn test_window_excludes_old_buckets() {
        let mut agg = GraphAggregator::new(10, 60);
        agg.ingest(&[
            span("1", None, "a", 1.0, 100, false),
            span("2", Some("1"), "b", 1.0, 100, false),
        ]);
        agg.ingest(&[
            span("3", None, "a", 1.0, 500, false),
            span("4", Some("3"), "c", 1.0, 500, false),
        ]);

        let recent = agg.snapshot_at(60, 500 * NANOS_PER_SEC);
        let recent_edges = edges(&recent);
        assert_eq!(recent_edges.len(), 1);
        assert_eq!(recent_edges[0].dst.as_str(), "c");

        let everything = agg.snapshot_at(1000, 500 * NANOS_PER_SEC);
        assert_eq!(edges(&everything).len(), 2);
    }

    #[test]
    fn test_retention_evicts_oldest_buckets() {
        let mut agg = GraphAggregator::new(1, 2);
        for (i, end) in [10u64, 20, 30].iter().enumerate() {
            let root = format!("r{}", i);
            let child = format!("c{}", i);
            agg.ingest(&[
                span(&root, None, "a", 1.0, *end, false),
                span(&child, Some(&root), "b", 1.0, *end, false),
            ]);
        }
        assert_eq!(agg.bucket_count(), 2);

        let snapshot = agg.snapshot_at(1000, 30 * NANOS_PER_SEC);
        assert_eq!(edges(&snapshot)[0].call_count, 2);
    }

    #[test]
    fn test_p95() {
        let stats = EdgeStats {
            call_count: 20,
            error_count: 0,
            durations: (1..=20).map(f64::from).collect(),
        };
        assert_eq!(stats.p95(), 20.0);

        let single = EdgeStats {
            call_count: 1,
            error_count: 0,
            durations: vec![12.345],
        };
        assert_eq!(single.p95(), 12.35);
        assert_eq!(EdgeStats::default().p95(), 0.0);
    }

    #[test]
    fn test_span_event_json() {
        let json = r#"{"trace_id":"ab","span_id":"01","service_name":"a","duration_ms":1.5,"end_time_ns":5}"#;
        let event: SpanEvent = serde_json::from_str(json).unwrap();
        assert!(event.parent_span_id.is_none());
        assert!(!event.is_error);
    }
}
