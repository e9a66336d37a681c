//! Tap handling and the detail panel bridge.
//!
//! The renderer reports taps as [`TapTarget`]s. The bridge keeps the current
//! [`Selection`] and forwards the tapped element's data to a [`DetailPanel`].

use serde::Serialize;
use tracing::debug;

use super::{GraphEngine, GraphRenderer};
use crate::data::element::{ElementId, ElementMetrics, VisualElement};
use crate::data::health::{format_error_rate, HealthTier};

/// Where a tap landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapTarget {
    Element(ElementId),
    /// Empty canvas.
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    Selected(ElementId),
}

impl Selection {
    pub fn selected(&self) -> Option<&ElementId> {
        match self {
            Selection::Idle => None,
            Selection::Selected(id) => Some(id),
        }
    }
}

/// Data shown for the selected element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetailPayload {
    Node {
        name: String,
        tier: HealthTier,
        total_calls: u64,
        total_errors: u64,
        error_rate: String,
    },
    Edge {
        src: String,
        dst: String,
        tier: HealthTier,
        call_count: u64,
        error_count: u64,
        p95_ms: f64,
        error_rate: String,
    },
}

impl DetailPayload {
    pub fn from_element(element: &VisualElement) -> Self {
        match &element.metrics {
            ElementMetrics::Edge(m) => DetailPayload::Edge {
                src: m.src.clone(),
                dst: m.dst.clone(),
                tier: element.tier,
                call_count: m.call_count,
                error_count: m.error_count,
                p95_ms: m.p95_ms,
                error_rate: format_error_rate(m.error_count, m.call_count),
            },
            ElementMetrics::Node(m) => DetailPayload::Node {
                name: element.label.clone(),
                tier: element.tier,
                total_calls: m.total_calls,
                total_errors: m.total_errors,
                error_rate: if m.error_rate.is_empty() {
                    format_error_rate(m.total_errors, m.total_calls)
                } else {
                    m.error_rate.clone()
                },
            },
        }
    }

    pub fn tier(&self) -> HealthTier {
        match self {
            DetailPayload::Node { tier, .. } | DetailPayload::Edge { tier, .. } => *tier,
        }
    }

    pub fn error_rate(&self) -> &str {
        match self {
            DetailPayload::Node { error_rate, .. } | DetailPayload::Edge { error_rate, .. } => {
                error_rate
            }
        }
    }
}

/// Receives the selected element's details.
pub trait DetailPanel {
    fn show_details(&mut self, payload: DetailPayload);
    fn hide_details(&mut self);
}

/// Tap -> selection -> detail panel.
#[derive(Debug)]
pub struct SelectionBridge<D: DetailPanel> {
    panel: D,
    selection: Selection,
}

impl<D: DetailPanel> SelectionBridge<D> {
    pub fn new(panel: D) -> Self {
        Self {
            panel,
            selection: Selection::Idle,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn panel(&self) -> &D {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut D {
        &mut self.panel
    }

    /// Handle a tap reported by the renderer.
    pub fn on_tap<R: GraphRenderer>(&mut self, target: TapTarget, engine: &GraphEngine<R>) {
        match target {
            TapTarget::Background => self.clear(),
            TapTarget::Element(id) => {
                let Some(element) = engine.element(&id) else {
                    debug!(element = %id, "ignoring tap on element that is not displayed");
                    return;
                };
                self.panel.show_details(DetailPayload::from_element(element));
                self.selection = Selection::Selected(id);
            }
        }
    }

    /// Back to idle and clear the panel.
    pub fn clear(&mut self) {
        self.selection = Selection::Idle;
        self.panel.hide_details();
    }

    /// Re-sync the panel after a reconciliation.
    ///
    /// Pushes fresh data for a selection that is still displayed; a selection
    /// whose element disappeared goes back to idle.
    pub fn refresh<R: GraphRenderer>(&mut self, engine: &GraphEngine<R>) {
        let Selection::Selected(id) = &self.selection else {
            return;
        };
        match engine.element(id) {
            Some(element) => self.panel.show_details(DetailPayload::from_element(element)),
            None => {
                debug!(element = %id, "selected element left the graph");
                self.clear();
            }
        }
    }
}
