//! In-terminal graph model driven by the reconciliation engine.
//!
//! [`TuiGraph`] stores the descriptors it is handed, keyed by wire id, and
//! assigns every service a layout slot. Slots only move when the engine
//! asks for a layout pass, so rows keep their place across updates.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, trace};

use crate::data::{ElementDescriptor, ElementId, ElementKind, HealthTier};
use crate::engine::{GraphRenderer, LayoutAlgorithm, LayoutDirective};

/// Position of a service in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot {
    /// Call depth from the nearest root (0 for grid layout).
    pub rank: usize,
    /// Position within the rank.
    pub order: usize,
}

/// A service as drawn, including endpoints only known from edges.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode<'a> {
    pub id: &'a str,
    pub name: String,
    pub tier: HealthTier,
    pub slot: Option<Slot>,
    /// The descriptor, absent for implicit endpoints.
    pub descriptor: Option<&'a ElementDescriptor>,
}

impl GraphNode<'_> {
    pub fn is_implicit(&self) -> bool {
        self.descriptor.is_none()
    }
}

#[derive(Debug, Default)]
pub struct TuiGraph {
    elements: BTreeMap<String, ElementDescriptor>,
    slots: HashMap<String, Slot>,
    layout_runs: u64,
}

impl TuiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ElementDescriptor> {
        self.elements.get(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of layout passes run so far.
    pub fn layout_runs(&self) -> u64 {
        self.layout_runs
    }

    pub fn slot(&self, node_id: &str) -> Option<Slot> {
        self.slots.get(node_id).copied()
    }

    /// Edge descriptors in id order.
    pub fn edges(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.elements.values().filter(|d| d.kind == ElementKind::Edge)
    }

    /// Wire ids of every service: materialized nodes plus edge endpoints
    /// that have no node of their own.
    fn node_ids(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        for descriptor in self.elements.values() {
            match descriptor.kind {
                ElementKind::Node => {
                    ids.insert(descriptor.id.as_str());
                }
                ElementKind::Edge => {
                    ids.extend(descriptor.source.as_deref());
                    ids.extend(descriptor.target.as_deref());
                }
            }
        }
        ids
    }

    /// Services in layout order. Services added since the last layout pass
    /// come last, by name.
    pub fn nodes(&self) -> Vec<GraphNode<'_>> {
        let mut nodes: Vec<GraphNode<'_>> = self
            .node_ids()
            .into_iter()
            .map(|id| {
                let descriptor = self.elements.get(id);
                let name = match descriptor {
                    Some(d) => d.label.clone(),
                    None => match ElementId::parse_wire(id) {
                        Some(ElementId::Node(name)) => name,
                        _ => id.to_string(),
                    },
                };
                GraphNode {
                    id,
                    name,
                    tier: descriptor.map(|d| d.tier).unwrap_or(HealthTier::Unknown),
                    slot: self.slots.get(id).copied(),
                    descriptor,
                }
            })
            .collect();

        nodes.sort_by(|a, b| match (a.slot, b.slot) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        nodes
    }

    fn compute_slots(&self, directive: &LayoutDirective) -> HashMap<String, Slot> {
        // Node ids sorted by display name so ties break the same way every run.
        let mut ids: Vec<(String, &str)> = self
            .node_ids()
            .into_iter()
            .map(|id| {
                let name = match ElementId::parse_wire(id) {
                    Some(ElementId::Node(name)) => name,
                    _ => id.to_string(),
                };
                (name, id)
            })
            .collect();
        ids.sort();

        match directive.algorithm {
            LayoutAlgorithm::Grid => ids
                .iter()
                .enumerate()
                .map(|(order, (_, id))| (id.to_string(), Slot { rank: 0, order }))
                .collect(),
            LayoutAlgorithm::Breadthfirst => {
                let ranks = self.breadthfirst_ranks(&ids, directive.directed);
                let mut per_rank: HashMap<usize, usize> = HashMap::new();
                ids.iter()
                    .map(|(_, id)| {
                        let rank = ranks.get(id).copied().unwrap_or(0);
                        let next = per_rank.entry(rank).or_default();
                        let slot = Slot { rank, order: *next };
                        *next += 1;
                        (id.to_string(), slot)
                    })
                    .collect()
            }
        }
    }

    /// Depth of each service from the graph roots.
    ///
    /// Roots are services nobody calls. Services left unreached (cycles)
    /// seed a new search in name order.
    fn breadthfirst_ranks<'a>(
        &'a self,
        ids: &[(String, &'a str)],
        directed: bool,
    ) -> HashMap<&'a str, usize> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut has_caller: BTreeSet<&str> = BTreeSet::new();
        for edge in self.edges() {
            let (Some(src), Some(dst)) = (edge.source.as_deref(), edge.target.as_deref()) else {
                continue;
            };
            adjacency.entry(src).or_default().push(dst);
            if directed {
                has_caller.insert(dst);
            } else {
                adjacency.entry(dst).or_default().push(src);
            }
        }
        for targets in adjacency.values_mut() {
            targets.sort();
            targets.dedup();
        }

        let mut ranks: HashMap<&str, usize> = HashMap::new();
        let roots = ids.iter().map(|(_, id)| *id).filter(|id| !has_caller.contains(id));
        let fallback = ids.iter().map(|(_, id)| *id);

        for seed in roots.chain(fallback) {
            if ranks.contains_key(seed) {
                continue;
            }
            ranks.insert(seed, 0);
            let mut queue = VecDeque::from([seed]);
            while let Some(current) = queue.pop_front() {
                let depth = ranks[current];
                for &next in adjacency.get(current).into_iter().flatten() {
                    if !ranks.contains_key(next) {
                        ranks.insert(next, depth + 1);
                        queue.push_back(next);
                    }
                }
            }
        }
        ranks
    }
}

impl GraphRenderer for TuiGraph {
    fn add_element(&mut self, descriptor: ElementDescriptor) {
        trace!(id = %descriptor.id, "add");
        self.elements.insert(descriptor.id.clone(), descriptor);
    }

    fn update_element_data(&mut self, id: &str, descriptor: ElementDescriptor) {
        trace!(id, "update");
        self.elements.insert(id.to_string(), descriptor);
    }

    fn remove_element(&mut self, id: &str) {
        trace!(id, "remove");
        self.elements.remove(id);
        self.slots.remove(id);
    }

    fn run_layout(&mut self, directive: &LayoutDirective) {
        self.slots = self.compute_slots(directive);
        self.layout_runs += 1;
        debug!(
            algorithm = ?directive.algorithm,
            nodes = self.slots.len(),
            "layout pass"
        );
    }

    fn current_element_ids(&self) -> BTreeSet<String> {
        self.elements.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GraphEngine;
    use crate::source::{EdgeDescriptor, GraphSnapshot, NodeDescriptor};

    fn chain_snapshot() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                NodeDescriptor::new("db", 10, 0).into(),
                NodeDescriptor::new("api", 10, 0).into(),
                NodeDescriptor::new("web", 0, 0).into(),
            ],
            edges: vec![
                EdgeDescriptor::new("web", "api", 10, 0, 5.0).into(),
                EdgeDescriptor::new("api", "db", 10, 0, 2.0).into(),
            ],
        }
    }

    fn names(graph: &TuiGraph) -> Vec<String> {
        graph.nodes().into_iter().map(|n| n.name).collect()
    }

    #[test]
    fn test_breadthfirst_ranks_follow_calls() {
        let mut engine = GraphEngine::new(TuiGraph::new());
        engine.apply_snapshot(&chain_snapshot());

        let graph = engine.renderer();
        assert_eq!(graph.layout_runs(), 1);
        assert_eq!(names(graph), vec!["web", "api", "db"]);
        let ranks: Vec<_> = graph.nodes().iter().map(|n| n.slot.unwrap().rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn test_grid_uses_name_order() {
        let directive = LayoutDirective {
            algorithm: LayoutAlgorithm::Grid,
            directed: true,
        };
        let mut engine = GraphEngine::with_layout(
            TuiGraph::new(),
            crate::engine::LayoutPolicy::Cardinality,
            directive,
        );
        engine.apply_snapshot(&chain_snapshot());
        assert_eq!(names(engine.renderer()), vec!["api", "db", "web"]);
    }

    #[test]
    fn test_cycles_still_get_slots() {
        let mut engine = GraphEngine::new(TuiGraph::new());
        engine.apply_snapshot(&GraphSnapshot {
            nodes: vec![],
            edges: vec![
                EdgeDescriptor::new("a", "b", 1, 0, 1.0).into(),
                EdgeDescriptor::new("b", "a", 1, 0, 1.0).into(),
            ],
        });
        let nodes = engine.renderer().nodes();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.slot.is_some()));
        assert_eq!(nodes[0].name, "a");
    }

    #[test]
    fn test_edge_endpoints_without_nodes_are_implicit() {
        let mut engine = GraphEngine::new(TuiGraph::new());
        engine.apply_snapshot(&GraphSnapshot {
            nodes: vec![NodeDescriptor::new("api", 5, 0).into()],
            edges: vec![EdgeDescriptor::new("web", "api", 5, 0, 1.0).into()],
        });

        let nodes = engine.renderer().nodes();
        let web = nodes.iter().find(|n| n.name == "web").unwrap();
        assert!(web.is_implicit());
        assert_eq!(web.tier, HealthTier::Unknown);
        let api = nodes.iter().find(|n| n.name == "api").unwrap();
        assert!(!api.is_implicit());
        assert_eq!(api.tier, HealthTier::Good);
    }

    #[test]
    fn test_updates_keep_slots() {
        let mut engine = GraphEngine::new(TuiGraph::new());
        engine.apply_snapshot(&chain_snapshot());
        let before = engine.renderer().slot(&ElementId::node("db").wire());

        let mut updated = chain_snapshot();
        updated.nodes[0] = NodeDescriptor::new("db", 10, 5).into();
        engine.apply_snapshot(&updated);

        let graph = engine.renderer();
        assert_eq!(graph.layout_runs(), 1);
        assert_eq!(graph.slot(&ElementId::node("db").wire()), before);
        let db = graph.get(&ElementId::node("db").wire()).unwrap();
        assert_eq!(db.tier, HealthTier::Critical);
    }

    #[test]
    fn test_removal_forgets_element() {
        let mut engine = GraphEngine::new(TuiGraph::new());
        engine.apply_snapshot(&chain_snapshot());
        engine.apply_snapshot(&GraphSnapshot::default());
        assert!(engine.renderer().is_empty());
        assert!(engine.renderer().nodes().is_empty());
    }
}
