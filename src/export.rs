//! JSON export of the displayed graph.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::{ElementKind, ElementMetrics, HealthTier, TierCounts, VisualElement};

#[derive(Debug, Serialize)]
pub struct Export {
    pub summary: Summary,
    pub elements: Vec<ExportedElement>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub services: TierCounts,
    pub calls: TierCounts,
}

#[derive(Debug, Serialize)]
pub struct ExportedElement {
    pub id: String,
    pub kind: ElementKind,
    pub label: String,
    pub tier: HealthTier,
    pub metrics: ElementMetrics,
}

impl Export {
    /// Snapshot the given elements, services first then calls.
    pub fn build<'a>(elements: impl IntoIterator<Item = &'a VisualElement>) -> Self {
        let mut elements: Vec<&VisualElement> = elements.into_iter().collect();
        elements.sort_by(|a, b| a.id.cmp(&b.id));

        let tiers_of = |kind: ElementKind| {
            TierCounts::from_tiers(elements.iter().filter(|e| e.kind() == kind).map(|e| e.tier))
        };
        let summary = Summary {
            services: tiers_of(ElementKind::Node),
            calls: tiers_of(ElementKind::Edge),
        };

        let elements = elements
            .into_iter()
            .map(|e| ExportedElement {
                id: e.id.wire(),
                kind: e.kind(),
                label: e.label.clone(),
                tier: e.tier,
                metrics: e.metrics.clone(),
            })
            .collect();

        Self { summary, elements }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::project;
    use crate::source::{EdgeDescriptor, GraphSnapshot, NodeDescriptor};

    fn elements() -> Vec<VisualElement> {
        project(&GraphSnapshot {
            nodes: vec![
                NodeDescriptor::new("api", 100, 20).into(),
                NodeDescriptor::new("db", 100, 0).into(),
            ],
            edges: vec![EdgeDescriptor::new("api", "db", 10, 0, 3.5).into()],
        })
    }

    #[test]
    fn test_summary_counts_by_kind() {
        let elements = elements();
        let export = Export::build(&elements);

        assert_eq!(export.summary.services.total, 2);
        assert_eq!(export.summary.services.critical, 1);
        assert_eq!(export.summary.services.good, 1);
        assert_eq!(export.summary.calls.total, 1);
        assert_eq!(export.elements.len(), 3);
        assert_eq!(export.elements[0].kind, ElementKind::Node);
        assert_eq!(export.elements[2].kind, ElementKind::Edge);
    }

    #[test]
    fn test_write_pretty_json() {
        let elements = elements();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        Export::build(&elements).write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["services"]["critical"], 1);
        assert_eq!(value["elements"][0]["label"], "api");
        assert_eq!(value["elements"][0]["metrics"]["totalCalls"], 100);
        assert_eq!(value["elements"][2]["metrics"]["p95_ms"], 3.5);
    }
}
