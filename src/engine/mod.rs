//! Graph reconciliation engine.
//!
//! [`GraphEngine`] owns the rendering collaborator and the set of element
//! ids currently materialized in it. Each call to [`GraphEngine::reconcile`]
//! turns a freshly projected element list into the minimal add / update /
//! remove operations against the renderer, so elements that survive from one
//! snapshot to the next keep whatever layout position the renderer gave them.
//!
//! ```text
//! GraphSnapshot ──project()──▶ Vec<VisualElement> ──reconcile()──▶ GraphRenderer
//!                                                        │
//!                                                        └──▶ ReconcileReport
//! ```

pub mod selection;

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::data::element::{ElementDescriptor, ElementId, GuardError, VisualElement};
use crate::data::project::project;
use crate::source::GraphSnapshot;

pub use selection::{DetailPanel, DetailPayload, Selection, SelectionBridge, TapTarget};

/// The rendering/layout collaborator driven by the engine.
///
/// Element ids passed across this boundary are wire ids
/// (see [`ElementId::wire`]).
pub trait GraphRenderer {
    /// Materialize a new element.
    fn add_element(&mut self, descriptor: ElementDescriptor);

    /// Replace the data of an existing element, keeping its position.
    fn update_element_data(&mut self, id: &str, descriptor: ElementDescriptor);

    fn remove_element(&mut self, id: &str);

    /// Recompute positions for every element.
    fn run_layout(&mut self, directive: &LayoutDirective);

    /// Ids of the elements the renderer currently holds.
    fn current_element_ids(&self) -> BTreeSet<String>;
}

/// When a full layout pass is requested after a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPolicy {
    /// Re-layout when the number of displayed elements changes.
    #[default]
    Cardinality,
    /// Re-layout whenever any element was added or removed.
    Topology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    /// Rank services by call depth from the roots of the graph.
    #[default]
    Breadthfirst,
    /// Place services in name order.
    Grid,
}

/// Layout instruction passed to [`GraphRenderer::run_layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDirective {
    pub algorithm: LayoutAlgorithm,
    /// Follow edges only from caller to callee when ranking.
    pub directed: bool,
}

impl Default for LayoutDirective {
    fn default() -> Self {
        Self {
            algorithm: LayoutAlgorithm::Breadthfirst,
            directed: true,
        }
    }
}

/// What a reconciliation pass did, in wire ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Elements refused by the serialization guard.
    pub dropped: Vec<(String, GuardError)>,
    pub layout_needed: bool,
}

impl ReconcileReport {
    /// True when elements were added or removed.
    pub fn topology_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// The reconciling engine.
///
/// Constructed once by the host and passed around by reference; it is the
/// only writer of the renderer's element set.
#[derive(Debug)]
pub struct GraphEngine<R: GraphRenderer> {
    renderer: R,
    displayed: BTreeMap<ElementId, VisualElement>,
    policy: LayoutPolicy,
    directive: LayoutDirective,
    reconciliations: u64,
}

impl<R: GraphRenderer> GraphEngine<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_layout(renderer, LayoutPolicy::default(), LayoutDirective::default())
    }

    pub fn with_layout(renderer: R, policy: LayoutPolicy, directive: LayoutDirective) -> Self {
        Self {
            renderer,
            displayed: BTreeMap::new(),
            policy,
            directive,
            reconciliations: 0,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Number of reconciliation passes run so far.
    pub fn reconciliations(&self) -> u64 {
        self.reconciliations
    }

    pub fn displayed_len(&self) -> usize {
        self.displayed.len()
    }

    pub fn displayed_ids(&self) -> impl Iterator<Item = &ElementId> {
        self.displayed.keys()
    }

    pub fn displayed_elements(&self) -> impl Iterator<Item = &VisualElement> {
        self.displayed.values()
    }

    pub fn is_displayed(&self, id: &ElementId) -> bool {
        self.displayed.contains_key(id)
    }

    /// Latest data for a displayed element.
    pub fn element(&self, id: &ElementId) -> Option<&VisualElement> {
        self.displayed.get(id)
    }

    /// Project `snapshot` and reconcile the result.
    pub fn apply_snapshot(&mut self, snapshot: &GraphSnapshot) -> ReconcileReport {
        self.reconcile(project(snapshot))
    }

    /// Bring the renderer in line with `projected`.
    pub fn reconcile(&mut self, projected: Vec<VisualElement>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let previous_len = self.displayed.len();
        let materialized = self.renderer.current_element_ids();

        let incoming: BTreeSet<ElementId> = projected.iter().map(|e| e.id.clone()).collect();

        let stale: Vec<ElementId> =
            self.displayed.keys().filter(|id| !incoming.contains(*id)).cloned().collect();
        for id in stale {
            let wire = id.wire();
            self.renderer.remove_element(&wire);
            self.displayed.remove(&id);
            report.removed.push(wire);
        }

        for element in projected {
            let descriptor = match element.descriptor().sanitized() {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!(element = %element.id, error = %err, "dropping element from batch");
                    report.dropped.push((element.id.wire(), err));
                    continue;
                }
            };
            let wire = descriptor.id.clone();

            if self.displayed.contains_key(&element.id) {
                if materialized.contains(&wire) {
                    self.renderer.update_element_data(&wire, descriptor);
                    report.updated.push(wire);
                } else {
                    warn!(element = %element.id, "renderer lost element, re-adding");
                    self.renderer.add_element(descriptor);
                    report.added.push(wire);
                }
            } else {
                self.renderer.add_element(descriptor);
                report.added.push(wire);
            }
            self.displayed.insert(element.id.clone(), element);
        }

        let current_len = self.displayed.len();
        report.layout_needed = current_len > 0
            && match self.policy {
                LayoutPolicy::Cardinality => previous_len == 0 || previous_len != current_len,
                LayoutPolicy::Topology => previous_len == 0 || report.topology_changed(),
            };

        if report.layout_needed {
            self.renderer.run_layout(&self.directive);
        }

        self.reconciliations += 1;
        debug!(
            pass = self.reconciliations,
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            dropped = report.dropped.len(),
            layout = report.layout_needed,
            "reconciled graph"
        );

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::element::{ElementMetrics, NodeMetrics};
    use crate::data::HealthTier;
    use crate::source::{EdgeDescriptor, NodeDescriptor, NodeEntry};

    /// One recorded renderer call.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Op {
        Add(String),
        Update(String),
        Remove(String),
        Layout,
    }

    /// Renderer double that records every call.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRenderer {
        pub ops: Vec<Op>,
        pub elements: BTreeMap<String, ElementDescriptor>,
    }

    impl RecordingRenderer {
        pub fn take_ops(&mut self) -> Vec<Op> {
            std::mem::take(&mut self.ops)
        }
    }

    impl GraphRenderer for RecordingRenderer {
        fn add_element(&mut self, descriptor: ElementDescriptor) {
            self.ops.push(Op::Add(descriptor.id.clone()));
            self.elements.insert(descriptor.id.clone(), descriptor);
        }

        fn update_element_data(&mut self, id: &str, descriptor: ElementDescriptor) {
            self.ops.push(Op::Update(id.to_string()));
            self.elements.insert(id.to_string(), descriptor);
        }

        fn remove_element(&mut self, id: &str) {
            self.ops.push(Op::Remove(id.to_string()));
            self.elements.remove(id);
        }

        fn run_layout(&mut self, _directive: &LayoutDirective) {
            self.ops.push(Op::Layout);
        }

        fn current_element_ids(&self) -> BTreeSet<String> {
            self.elements.keys().cloned().collect()
        }
    }

    fn snapshot(nodes: &[&str], edges: &[(&str, &str)]) -> GraphSnapshot {
        GraphSnapshot {
            nodes: nodes.iter().map(|n| NodeDescriptor::new(*n, 10, 0).into()).collect(),
            edges: edges
                .iter()
                .map(|(s, d)| EdgeDescriptor::new(*s, *d, 10, 1, 42.0).into())
                .collect(),
        }
    }

    fn count(ops: &[Op], pred: impl Fn(&Op) -> bool) -> usize {
        ops.iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn test_first_reconciliation_adds_and_lays_out() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        let report = engine.apply_snapshot(&snapshot(&["a", "b"], &[("a", "b")]));

        assert_eq!(report.added.len(), 3);
        assert!(report.updated.is_empty());
        assert!(report.removed.is_empty());
        assert!(report.layout_needed);

        let ops = engine.renderer_mut().take_ops();
        assert_eq!(count(&ops, |op| *op == Op::Layout), 1);
        assert_eq!(ops.last(), Some(&Op::Layout));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        let snap = snapshot(&["a", "b"], &[("a", "b")]);
        engine.apply_snapshot(&snap);
        let before: Vec<_> = engine.displayed_ids().cloned().collect();
        engine.renderer_mut().take_ops();

        let report = engine.apply_snapshot(&snap);
        let ops = engine.renderer_mut().take_ops();

        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(report.updated.len(), 3);
        assert!(!report.layout_needed);
        assert_eq!(count(&ops, |op| matches!(op, Op::Add(_) | Op::Remove(_))), 0);
        assert_eq!(count(&ops, |op| *op == Op::Layout), 0);

        let after: Vec<_> = engine.displayed_ids().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_dropped_node_is_removed_once() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        engine.apply_snapshot(&snapshot(&["a", "b", "c"], &[]));
        engine.renderer_mut().take_ops();

        let report = engine.apply_snapshot(&snapshot(&["a", "c"], &[]));
        let b = ElementId::node("b").wire();

        assert_eq!(report.removed, vec![b.clone()]);
        let ops = engine.renderer_mut().take_ops();
        assert_eq!(count(&ops, |op| matches!(op, Op::Remove(_))), 1);
        assert!(ops.contains(&Op::Remove(b)));
        assert!(!engine.is_displayed(&ElementId::node("b")));
        assert!(engine.is_displayed(&ElementId::node("a")));
    }

    #[test]
    fn test_same_edge_is_updated_not_added() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        let snap = snapshot(&[], &[("a", "b")]);
        let first = engine.apply_snapshot(&snap);
        let second = engine.apply_snapshot(&snap);

        let edge = ElementId::edge("a", "b").wire();
        assert_eq!(first.added, vec![edge.clone()]);
        assert_eq!(second.updated, vec![edge]);
        assert!(second.added.is_empty());
    }

    #[test]
    fn test_layout_follows_cardinality() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());

        assert!(engine.apply_snapshot(&snapshot(&["a", "b"], &[])).layout_needed);
        assert!(!engine.apply_snapshot(&snapshot(&["a", "b"], &[])).layout_needed);
        // Swap one node for another: same count, no re-layout.
        assert!(!engine.apply_snapshot(&snapshot(&["a", "c"], &[])).layout_needed);
        assert!(engine.apply_snapshot(&snapshot(&["a", "c", "d"], &[])).layout_needed);
        // Shrinking to nothing leaves no positions to compute.
        assert!(!engine.apply_snapshot(&snapshot(&[], &[])).layout_needed);
        assert!(engine.apply_snapshot(&snapshot(&["a"], &[])).layout_needed);
    }

    #[test]
    fn test_empty_first_snapshot_skips_layout() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        let report = engine.apply_snapshot(&GraphSnapshot::default());
        assert!(!report.layout_needed);
        assert!(engine.renderer().ops.is_empty());
    }

    #[test]
    fn test_topology_policy_catches_swaps() {
        let mut engine = GraphEngine::with_layout(
            RecordingRenderer::default(),
            LayoutPolicy::Topology,
            LayoutDirective::default(),
        );
        assert!(engine.apply_snapshot(&snapshot(&["a", "b"], &[])).layout_needed);
        assert!(!engine.apply_snapshot(&snapshot(&["a", "b"], &[])).layout_needed);
        assert!(engine.apply_snapshot(&snapshot(&["a", "c"], &[])).layout_needed);
    }

    #[test]
    fn test_guard_failure_drops_only_that_element() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        let good = VisualElement {
            id: ElementId::node("good"),
            label: "good".to_string(),
            tier: HealthTier::Good,
            metrics: ElementMetrics::Node(NodeMetrics {
                total_calls: 1,
                total_errors: 0,
                error_rate: "0.00".to_string(),
            }),
        };
        let bad = VisualElement {
            id: ElementId::node("[object Object]"),
            label: "bad".to_string(),
            ..good.clone()
        };

        let report = engine.reconcile(vec![bad, good]);
        assert_eq!(report.added, vec![ElementId::node("good").wire()]);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(engine.displayed_len(), 1);
        assert!(!engine.is_displayed(&ElementId::node("[object Object]")));
    }

    #[test]
    fn test_refused_update_keeps_previous_data() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        engine.apply_snapshot(&snapshot(&[], &[("a", "b")]));
        engine.renderer_mut().take_ops();

        let id = ElementId::edge("a", "b");
        let mut poisoned = engine.element(&id).cloned().unwrap();
        if let ElementMetrics::Edge(metrics) = &mut poisoned.metrics {
            metrics.p95_ms = f64::NAN;
        }

        let report = engine.reconcile(vec![poisoned]);
        assert_eq!(report.dropped.len(), 1);
        assert!(report.removed.is_empty());
        assert!(report.updated.is_empty());
        assert!(engine.is_displayed(&id));
        assert!(engine.renderer_mut().take_ops().is_empty());

        match engine.element(&id).map(|e| &e.metrics) {
            Some(ElementMetrics::Edge(metrics)) => assert_eq!(metrics.p95_ms, 42.0),
            other => panic!("expected edge metrics, got {:?}", other),
        }
    }

    #[test]
    fn test_lost_element_is_re_added() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        let snap = snapshot(&["a"], &[]);
        engine.apply_snapshot(&snap);
        engine.renderer_mut().elements.clear();

        let report = engine.apply_snapshot(&snap);
        assert_eq!(report.added, vec![ElementId::node("a").wire()]);
        assert!(report.updated.is_empty());
    }

    #[test]
    fn test_displayed_set_tracks_projection() {
        let mut engine = GraphEngine::new(RecordingRenderer::default());
        engine.apply_snapshot(&snapshot(&["a", "b"], &[("a", "b")]));
        engine.apply_snapshot(&GraphSnapshot {
            nodes: vec![NodeEntry::Legacy("b".into())],
            edges: vec![],
        });

        let ids: Vec<_> = engine.displayed_ids().cloned().collect();
        assert_eq!(ids, vec![ElementId::node("b")]);
        assert_eq!(
            engine.renderer().current_element_ids(),
            BTreeSet::from([ElementId::node("b").wire()])
        );
        assert_eq!(
            engine.element(&ElementId::node("b")).map(|e| e.tier),
            Some(HealthTier::Unknown)
        );
    }
}
