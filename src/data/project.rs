//! Snapshot -> visual element projection.

use std::collections::HashSet;

use tracing::warn;

use super::element::{EdgeMetrics, ElementId, ElementMetrics, NodeMetrics, VisualElement};
use super::health::{classify, format_error_rate};
use crate::source::{EdgeDescriptor, EdgeEntry, GraphSnapshot, NodeEntry};

/// Convert a snapshot into one visual element per node and per edge.
///
/// Nodes come first, in snapshot order, followed by edges. Malformed entries
/// and duplicate identities are skipped with a warning; the first occurrence
/// of an identity wins.
pub fn project(snapshot: &GraphSnapshot) -> Vec<VisualElement> {
    let mut elements = Vec::with_capacity(snapshot.len());
    let mut seen: HashSet<ElementId> = HashSet::with_capacity(snapshot.len());

    for (index, entry) in snapshot.nodes.iter().enumerate() {
        let Some(element) = project_node(entry) else {
            warn!(index, entry = ?entry, "skipping malformed node entry");
            continue;
        };
        if !seen.insert(element.id.clone()) {
            warn!(index, node = %element.id, "skipping duplicate node");
            continue;
        }
        elements.push(element);
    }

    for (index, entry) in snapshot.edges.iter().enumerate() {
        let edge = match entry {
            EdgeEntry::Edge(edge) => edge,
            EdgeEntry::Malformed(value) => {
                warn!(index, entry = %value, "skipping malformed edge entry");
                continue;
            }
        };
        let element = project_edge(edge);
        if !seen.insert(element.id.clone()) {
            warn!(index, edge = %element.id, "skipping duplicate edge");
            continue;
        }
        elements.push(element);
    }

    elements
}

fn project_node(entry: &NodeEntry) -> Option<VisualElement> {
    let (name, total_calls, total_errors) = match entry {
        NodeEntry::Legacy(name) => (name.as_str(), 0, 0),
        NodeEntry::Rich(node) => (node.name.as_str(), node.call_count, node.error_count),
        NodeEntry::Malformed(_) => return None,
    };

    Some(VisualElement {
        id: ElementId::node(name),
        label: name.to_string(),
        tier: classify(total_errors, total_calls),
        metrics: ElementMetrics::Node(NodeMetrics {
            total_calls,
            total_errors,
            error_rate: format_error_rate(total_errors, total_calls),
        }),
    })
}

fn project_edge(edge: &EdgeDescriptor) -> VisualElement {
    VisualElement {
        id: ElementId::edge(edge.src.as_str(), edge.dst.as_str()),
        label: format!("{} calls", edge.call_count),
        tier: classify(edge.error_count, edge.call_count),
        metrics: ElementMetrics::Edge(EdgeMetrics {
            src: edge.src.to_string(),
            dst: edge.dst.to_string(),
            call_count: edge.call_count,
            p95_ms: edge.p95_ms,
            error_count: edge.error_count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HealthTier;
    use crate::source::NodeDescriptor;

    fn parse(json: &str) -> GraphSnapshot {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_single_healthy_node() {
        let snapshot =
            parse(r#"{"nodes":[{"name":"svc-a","call_count":100,"error_count":0}],"edges":[]}"#);
        let elements = project(&snapshot);

        assert_eq!(elements.len(), 1);
        let element = &elements[0];
        assert_eq!(element.id, ElementId::node("svc-a"));
        assert_eq!(element.label, "svc-a");
        assert_eq!(element.tier, HealthTier::Good);
        assert_eq!(
            element.metrics,
            ElementMetrics::Node(NodeMetrics {
                total_calls: 100,
                total_errors: 0,
                error_rate: "0.00".to_string(),
            })
        );
    }

    #[test]
    fn test_legacy_nodes_are_unknown() {
        let elements = project(&parse(r#"{"nodes":["x","y"],"edges":[]}"#));
        assert_eq!(elements.len(), 2);
        assert!(elements.iter().all(|e| e.tier == HealthTier::Unknown));
        assert_eq!(elements[0].label, "x");
        assert_eq!(elements[1].label, "y");
    }

    #[test]
    fn test_edge_identity_is_stable() {
        let json = r#"{"nodes":[],"edges":[{"src":"a","dst":"b","call_count":10,"error_count":1,"p95_ms":42}]}"#;
        let first = project(&parse(json));
        let second = project(&parse(json));

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, ElementId::edge("a", "b"));
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].label, "10 calls");
        assert_eq!(first[0].tier, HealthTier::Warning);
        assert_eq!(
            first[0].metrics,
            ElementMetrics::Edge(EdgeMetrics {
                src: "a".to_string(),
                dst: "b".to_string(),
                call_count: 10,
                p95_ms: 42.0,
                error_count: 1,
            })
        );
    }

    #[test]
    fn test_edge_ids_do_not_depend_on_position() {
        let forward = parse(
            r#"{"edges":[{"src":"a","dst":"b","call_count":1},{"src":"b","dst":"c","call_count":1}]}"#,
        );
        let reversed = parse(
            r#"{"edges":[{"src":"b","dst":"c","call_count":1},{"src":"a","dst":"b","call_count":1}]}"#,
        );
        let mut a: Vec<_> = project(&forward).into_iter().map(|e| e.id).collect();
        let mut b: Vec<_> = project(&reversed).into_iter().map(|e| e.id).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let snapshot = parse(
            r#"{
                "nodes": [{"name": {"x": 1}}, {"name": "ok", "call_count": 5}],
                "edges": [{"src": "ok"}, {"src": "ok", "dst": "other", "call_count": 3}]
            }"#,
        );
        let elements = project(&snapshot);
        let ids: Vec<_> = elements.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec![ElementId::node("ok"), ElementId::edge("ok", "other")]);
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let elements = project(&parse(r#"{"nodes":[{"name":"idle"}]}"#));
        assert_eq!(elements[0].tier, HealthTier::Unknown);
        let ElementMetrics::Node(metrics) = &elements[0].metrics else {
            panic!("expected node metrics");
        };
        assert_eq!(metrics.total_calls, 0);
        assert_eq!(metrics.error_rate, "0.00");
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                NodeDescriptor::new("a", 100, 0).into(),
                NodeDescriptor::new("a", 100, 50).into(),
            ],
            edges: vec![
                EdgeDescriptor::new("a", "b", 10, 0, 1.0).into(),
                EdgeDescriptor::new("a", "b", 10, 9, 1.0).into(),
            ],
        };
        let elements = project(&snapshot);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].tier, HealthTier::Good);
        assert_eq!(elements[1].tier, HealthTier::Good);
    }

    #[test]
    fn test_node_and_edge_ids_never_collide() {
        let snapshot = GraphSnapshot {
            nodes: vec![NodeEntry::Legacy("edge:1:a:1:b".into())],
            edges: vec![EdgeDescriptor::new("a", "b", 1, 0, 0.0).into()],
        };
        let elements = project(&snapshot);
        assert_eq!(elements.len(), 2);
        assert_ne!(elements[0].id.wire(), elements[1].id.wire());
    }
}
