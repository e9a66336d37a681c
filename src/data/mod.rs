//! Data models and processing for dependency graph snapshots.
//!
//! This module turns raw graph snapshots into health-annotated visual
//! elements ready for reconciliation.
//!
//! ## Submodules
//!
//! - [`aggregate`]: Span aggregation into snapshots ([`GraphAggregator`])
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "2s", "500ms")
//! - [`element`]: Visual elements, their identities and the serialization guard
//! - [`health`]: Error-rate health tiers ([`HealthTier`], [`classify`])
//! - [`history`]: Historical tracking for sparklines and rate calculations
//! - [`project`]: Snapshot to element projection ([`project()`])
//!
//! ## Data Flow
//!
//! ```text
//! GraphSnapshot (raw JSON)
//!        │
//!        ▼
//! project()
//!        │
//!        ├──▶ VisualElement (tier from classify())
//!        │
//!        └──▶ GraphEngine::reconcile() ──▶ History::record()
//! ```

pub mod aggregate;
pub mod duration;
pub mod element;
pub mod health;
pub mod history;
pub mod project;

pub use aggregate::{GraphAggregator, SpanEvent};
pub use element::{
    EdgeMetrics, ElementDescriptor, ElementId, ElementKind, ElementMetrics, GuardError,
    NodeMetrics, VisualElement,
};
pub use health::{classify, format_error_rate, HealthTier, TierCounts};
pub use history::History;
pub use project::project;
