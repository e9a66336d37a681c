//! Channel-based data source.
//!
//! Receives graph snapshots via a tokio watch channel, for hosts that
//! produce snapshots in-process (an embedded aggregator, tests).

use tokio::sync::watch;

use super::{DataSource, GraphSnapshot};

/// A data source that receives graph snapshots via a channel.
///
/// # Example
///
/// ```
/// use depviz::ChannelSource;
///
/// let (tx, source) = ChannelSource::create("embedded");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<GraphSnapshot>,
    description: String,
    initial_returned: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// `source_description` says where snapshots come from and is shown in
    /// the status bar.
    pub fn new(receiver: watch::Receiver<GraphSnapshot>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
            initial_returned: false,
        }
    }

    /// Create a channel pair for sending snapshots to a ChannelSource.
    pub fn create(source_description: &str) -> (watch::Sender<GraphSnapshot>, Self) {
        let (tx, rx) = watch::channel(GraphSnapshot::default());
        let source = Self::new(rx, source_description);
        (tx, source)
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<GraphSnapshot> {
        // Return the initial value on first poll
        if !self.initial_returned {
            self.initial_returned = true;
            self.receiver.mark_changed();
        }

        if self.receiver.has_changed().unwrap_or(false) {
            Some(self.receiver.borrow_and_update().clone())
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        None
    }

    fn request_refresh(&mut self) {
        self.receiver.mark_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::NodeDescriptor;

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::create("test");

        // Initially returns the default (empty) snapshot
        assert!(source.poll().unwrap().is_empty());

        // No change, so poll returns None
        assert!(source.poll().is_none());

        tx.send(GraphSnapshot {
            nodes: vec![NodeDescriptor::new("api", 1, 0).into()],
            edges: vec![],
        })
        .unwrap();

        assert_eq!(source.poll().unwrap().len(), 1);
    }

    #[test]
    fn test_channel_source_refresh_replays_latest() {
        let (_tx, mut source) = ChannelSource::create("test");
        let _ = source.poll();
        assert!(source.poll().is_none());

        source.request_refresh();
        assert!(source.poll().is_some());
    }
}
