//! Visual elements produced by the projector and handed to the renderer.
//!
//! Identity is kept structured ([`ElementId`]) inside the engine and only
//! serialized to a string at the renderer boundary ([`ElementId::wire`]).
//! The wire form carries a kind prefix and length-prefixed fields, so two
//! distinct ids can never serialize to the same string no matter which
//! characters appear in service names.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::health::HealthTier;

/// Substrings that betray a structured value stringified upstream.
const CONFUSABLE_PLACEHOLDERS: &[&str] = &["[object Object]"];

/// Stable identity of a visual element across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementId {
    Node(String),
    Edge { src: String, dst: String },
}

impl ElementId {
    pub fn node(name: impl Into<String>) -> Self {
        ElementId::Node(name.into())
    }

    pub fn edge(src: impl Into<String>, dst: impl Into<String>) -> Self {
        ElementId::Edge {
            src: src.into(),
            dst: dst.into(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementId::Node(_) => ElementKind::Node,
            ElementId::Edge { .. } => ElementKind::Edge,
        }
    }

    /// The string handed to the renderer.
    ///
    /// `node:<len>:<name>` or `edge:<len>:<src>:<len>:<dst>`, lengths in bytes.
    pub fn wire(&self) -> String {
        match self {
            ElementId::Node(name) => format!("node:{}:{}", name.len(), name),
            ElementId::Edge { src, dst } => {
                format!("edge:{}:{}:{}:{}", src.len(), src, dst.len(), dst)
            }
        }
    }

    /// Inverse of [`ElementId::wire`].
    pub fn parse_wire(wire: &str) -> Option<Self> {
        if let Some(rest) = wire.strip_prefix("node:") {
            let (name, rest) = take_field(rest)?;
            return rest.is_empty().then(|| ElementId::Node(name.to_string()));
        }
        let rest = wire.strip_prefix("edge:")?;
        let (src, rest) = take_field(rest)?;
        let rest = rest.strip_prefix(':')?;
        let (dst, rest) = take_field(rest)?;
        rest.is_empty().then(|| ElementId::edge(src, dst))
    }
}

/// Split `<len>:<bytes>` off the front of `s`.
fn take_field(s: &str) -> Option<(&str, &str)> {
    let (len, rest) = s.split_once(':')?;
    let len: usize = len.parse().ok()?;
    if !rest.is_char_boundary(len.min(rest.len())) || rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Node(name) => write!(f, "{}", name),
            ElementId::Edge { src, dst } => write!(f, "{} -> {}", src, dst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Edge,
}

/// Node metrics for the detail panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    pub total_calls: u64,
    pub total_errors: u64,
    /// Percentage with two decimals.
    pub error_rate: String,
}

/// Edge metrics for the detail panel, carried verbatim from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetrics {
    pub src: String,
    pub dst: String,
    pub call_count: u64,
    pub p95_ms: f64,
    pub error_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementMetrics {
    Node(NodeMetrics),
    Edge(EdgeMetrics),
}

/// One projected element: a service or a call relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualElement {
    pub id: ElementId,
    pub label: String,
    pub tier: HealthTier,
    pub metrics: ElementMetrics,
}

impl VisualElement {
    pub fn kind(&self) -> ElementKind {
        self.id.kind()
    }

    /// Build the descriptor handed to the renderer.
    pub fn descriptor(&self) -> ElementDescriptor {
        let (source, target) = match &self.id {
            ElementId::Edge { src, dst } => (
                Some(ElementId::node(src.as_str()).wire()),
                Some(ElementId::node(dst.as_str()).wire()),
            ),
            ElementId::Node(_) => (None, None),
        };
        ElementDescriptor {
            id: self.id.wire(),
            kind: self.kind(),
            label: self.label.clone(),
            source,
            target,
            tier: self.tier,
            metrics: self.metrics.clone(),
        }
    }
}

/// Renderer-facing element data.
///
/// `source`/`target` hold the wire ids of the endpoint nodes for edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: String,
    pub kind: ElementKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub tier: HealthTier,
    pub metrics: ElementMetrics,
}

/// Reasons an element is refused at the renderer boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardError {
    #[error("element id is empty")]
    EmptyId,

    #[error("element id {0:?} contains a placeholder for a stringified object")]
    ConfusableId(String),

    #[error("element id {0:?} contains control characters")]
    ControlCharacters(String),

    #[error("element data does not survive serialization: {0}")]
    RoundTrip(String),
}

impl ElementDescriptor {
    /// Round-trip the descriptor through `serde_json::Value`.
    ///
    /// Returns the decoded copy, which is what the renderer receives. Fails
    /// when the id looks like a stringified structured value or when any
    /// field does not come back intact (non-finite numbers serialize to
    /// `null` and fail to decode).
    pub fn sanitized(&self) -> Result<ElementDescriptor, GuardError> {
        check_id(&self.id)?;
        for endpoint in self.source.iter().chain(self.target.iter()) {
            check_id(endpoint)?;
        }

        let value =
            serde_json::to_value(self).map_err(|e| GuardError::RoundTrip(e.to_string()))?;
        let copy: ElementDescriptor =
            serde_json::from_value(value).map_err(|e| GuardError::RoundTrip(e.to_string()))?;

        if copy != *self {
            return Err(GuardError::RoundTrip(format!(
                "decoded element {} differs from the original",
                self.id
            )));
        }
        Ok(copy)
    }
}

fn check_id(id: &str) -> Result<(), GuardError> {
    if id.is_empty() {
        return Err(GuardError::EmptyId);
    }
    if CONFUSABLE_PLACEHOLDERS.iter().any(|p| id.contains(p)) {
        return Err(GuardError::ConfusableId(id.to_string()));
    }
    if id.chars().any(char::is_control) {
        return Err(GuardError::ControlCharacters(id.to_string()));
    }
    Ok(())
}
