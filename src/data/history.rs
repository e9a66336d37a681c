//! Historical call counts for sparklines and rate calculations.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use super::element::{ElementMetrics, VisualElement};

/// Maximum number of readings kept per service.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks per-service call and error counts across snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Call count readings per service (name -> readings).
    pub service_calls: HashMap<String, VecDeque<u64>>,
    /// Error count readings per service.
    pub service_errors: HashMap<String, VecDeque<u64>>,
    /// When each reading was taken.
    pub timestamps: VecDeque<Instant>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record node counts from a reconciled element set.
    ///
    /// Services missing from this reading are forgotten.
    pub fn record<'a>(&mut self, elements: impl IntoIterator<Item = &'a VisualElement>, at: Instant) {
        let mut seen = Vec::new();
        for element in elements {
            let ElementMetrics::Node(metrics) = &element.metrics else {
                continue;
            };
            push_capped(self.service_calls.entry(element.label.clone()).or_default(), metrics.total_calls);
            push_capped(
                self.service_errors.entry(element.label.clone()).or_default(),
                metrics.total_errors,
            );
            seen.push(element.label.as_str());
        }
        self.service_calls.retain(|name, _| seen.contains(&name.as_str()));
        self.service_errors.retain(|name, _| seen.contains(&name.as_str()));

        self.timestamps.push_back(at);
        if self.timestamps.len() > MAX_HISTORY_SIZE {
            self.timestamps.pop_front();
        }
    }

    /// Clear all readings, e.g. after the aggregation window changed.
    pub fn clear(&mut self) {
        self.service_calls.clear();
        self.service_errors.clear();
        self.timestamps.clear();
    }

    /// Sparkline of call counts (normalized to 0-7 for 8 bar levels).
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn calls_sparkline(&self, service: &str) -> Vec<u8> {
        let Some(values) = self.service_calls.get(service) else {
            return Vec::new();
        };
        if values.len() < 2 {
            return Vec::new();
        }

        let max = values.iter().copied().max().unwrap_or(0);
        let min = values.iter().copied().min().unwrap_or(0);
        let range = (max - min).max(1) as f64;

        values
            .iter()
            .map(|&v| {
                let normalized = ((v - min) as f64 / range * 7.0) as u8;
                normalized.min(7)
            })
            .collect()
    }

    /// Change in windowed call count per second between the last two readings.
    ///
    /// Returns None if there's not enough history to calculate a rate.
    pub fn call_rate(&self, service: &str) -> Option<f64> {
        let calls = self.service_calls.get(service)?;
        if calls.len() < 2 || self.timestamps.len() < 2 {
            return None;
        }

        let current = *calls.back()?;
        let previous = *calls.get(calls.len() - 2)?;
        let delta = current as i64 - previous as i64;

        let current_time = self.timestamps.back()?;
        let previous_time = self.timestamps.get(self.timestamps.len() - 2)?;
        let elapsed = current_time.duration_since(*previous_time).as_secs_f64();

        if elapsed > 0.0 {
            Some(delta as f64 / elapsed)
        } else {
            None
        }
    }
}

fn push_capped(values: &mut VecDeque<u64>, value: u64) {
    values.push_back(value);
    if values.len() > MAX_HISTORY_SIZE {
        values.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::project;
    use crate::source::{EdgeDescriptor, GraphSnapshot, NodeDescriptor};
    use std::time::Duration;

    fn elements(calls: u64) -> Vec<VisualElement> {
        project(&GraphSnapshot {
            nodes: vec![NodeDescriptor::new("api", calls, 0).into()],
            edges: vec![EdgeDescriptor::new("web", "api", calls, 0, 1.0).into()],
        })
    }

    #[test]
    fn test_record_only_tracks_nodes() {
        let mut history = History::new();
        history.record(&elements(10), Instant::now());
        assert_eq!(history.service_calls.len(), 1);
        assert_eq!(history.service_calls["api"], VecDeque::from(vec![10]));
    }

    #[test]
    fn test_call_rate() {
        let mut history = History::new();
        let start = Instant::now();
        history.record(&elements(10), start);
        assert!(history.call_rate("api").is_none());

        history.record(&elements(30), start + Duration::from_secs(2));
        assert_eq!(history.call_rate("api"), Some(10.0));
    }

    #[test]
    fn test_sparkline_is_normalized() {
        let mut history = History::new();
        let start = Instant::now();
        for (i, calls) in [0u64, 5, 10].into_iter().enumerate() {
            history.record(&elements(calls), start + Duration::from_secs(i as u64));
        }
        assert_eq!(history.calls_sparkline("api"), vec![0, 3, 7]);
        assert!(history.calls_sparkline("missing").is_empty());
    }

    #[test]
    fn test_departed_services_are_forgotten() {
        let mut history = History::new();
        history.record(&elements(10), Instant::now());
        history.record(&[], Instant::now());
        assert!(history.service_calls.is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let mut history = History::new();
        let start = Instant::now();
        for i in 0..(MAX_HISTORY_SIZE as u64 + 5) {
            history.record(&elements(i), start + Duration::from_millis(i));
        }
        assert_eq!(history.service_calls["api"].len(), MAX_HISTORY_SIZE);
        assert_eq!(history.timestamps.len(), MAX_HISTORY_SIZE);
    }
}
