//! Application state and navigation logic.

use std::cell::Cell;
use std::path::Path;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::data::{ElementId, ElementKind, History, TierCounts};
use crate::engine::{GraphEngine, SelectionBridge, TapTarget};
use crate::export::Export;
use crate::source::{ConnectionStatus, DataSource};
use crate::ui::dependencies::{self, DependencySortColumn};
use crate::ui::detail::DetailPane;
use crate::ui::graph::TuiGraph;
use crate::ui::services::{self, SortColumn};
use crate::ui::Theme;

/// Observation windows offered by the window selector, in seconds.
pub const WINDOW_CHOICES: [u64; 4] = [30, 60, 300, 900];

/// The current view/tab in the TUI.
///
/// Element detail is shown as an overlay driven by the selection bridge
/// rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Every service in layout order with health status.
    Services,
    /// Call relationships, worst first.
    Dependencies,
    /// Caller/callee adjacency matrix.
    Flow,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Services => View::Dependencies,
            View::Dependencies => View::Flow,
            View::Flow => View::Services,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        match self {
            View::Services => View::Flow,
            View::Dependencies => View::Services,
            View::Flow => View::Dependencies,
        }
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Services => "Services",
            View::Dependencies => "Dependencies",
            View::Flow => "Flow",
        }
    }
}

/// Short label for a window length, e.g. "5m".
pub fn window_label(secs: u64) -> String {
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,

    // Data source and graph
    source: Box<dyn DataSource>,
    pub engine: GraphEngine<TuiGraph>,
    pub bridge: SelectionBridge<DetailPane>,
    pub history: History,
    pub load_error: Option<String>,
    status: watch::Receiver<ConnectionStatus>,
    pub window_sec: u64,
    pub last_updated: Option<Instant>,

    // Navigation state
    pub selected_service_index: usize,
    pub selected_dependency_index: usize,

    // Sorting (Services view)
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    // Sorting (Dependencies view)
    pub dependency_sort_column: DependencySortColumn,
    pub dependency_sort_ascending: bool,

    // Search/filter
    pub filter_text: String,
    pub filter_active: bool,

    // UI
    pub theme: Theme,
    /// First rendered row of each scrolling table, written back on draw.
    services_offset: Cell<usize>,
    dependencies_offset: Cell<usize>,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App around a source and the engine that will draw it.
    pub fn new(
        source: Box<dyn DataSource>,
        engine: GraphEngine<TuiGraph>,
        status: watch::Receiver<ConnectionStatus>,
        window_sec: u64,
        theme: Theme,
    ) -> Self {
        Self {
            running: true,
            current_view: View::Services,
            show_help: false,
            source,
            engine,
            bridge: SelectionBridge::new(DetailPane::default()),
            history: History::new(),
            load_error: None,
            status,
            window_sec,
            last_updated: None,
            selected_service_index: 0,
            selected_dependency_index: 0,
            sort_column: SortColumn::default(),
            sort_ascending: true,
            dependency_sort_column: DependencySortColumn::default(),
            dependency_sort_ascending: false, // Default descending (critical first)
            filter_text: String::new(),
            filter_active: false,
            theme,
            services_offset: Cell::new(0),
            dependencies_offset: Cell::new(0),
            status_message: None,
        }
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < std::time::Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Poll the data source and run a new snapshot through the engine.
    ///
    /// Returns true if a snapshot was applied.
    pub fn reload_data(&mut self) -> bool {
        let snapshot = self.source.poll();
        self.load_error = self.source.error().map(str::to_string);

        let Some(snapshot) = snapshot else {
            return false;
        };

        let report = self.engine.apply_snapshot(&snapshot);
        debug!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            dropped = report.dropped.len(),
            layout = report.layout_needed,
            "applied snapshot"
        );
        self.bridge.refresh(&self.engine);
        self.history.record(self.engine.displayed_elements(), Instant::now());
        self.last_updated = Some(Instant::now());
        self.clamp_selection();
        true
    }

    fn clamp_selection(&mut self) {
        let services = self.visible_count(View::Services);
        if self.selected_service_index >= services {
            self.selected_service_index = services.saturating_sub(1);
        }
        let dependencies = self.visible_count(View::Dependencies);
        if self.selected_dependency_index >= dependencies {
            self.selected_dependency_index = dependencies.saturating_sub(1);
        }
    }

    /// Tier counts for services and for calls.
    pub fn tier_counts(&self) -> (TierCounts, TierCounts) {
        let tiers = |kind: ElementKind| {
            TierCounts::from_tiers(
                self.engine
                    .displayed_elements()
                    .filter(|e| e.kind() == kind)
                    .map(|e| e.tier),
            )
        };
        (tiers(ElementKind::Node), tiers(ElementKind::Edge))
    }

    /// Switch to the next view (cycles through Services → Dependencies → Flow).
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Number of rows the given view currently shows.
    fn visible_count(&self, view: View) -> usize {
        match view {
            View::Services => services::rows(self).len(),
            View::Dependencies => dependencies::rows(self).len(),
            View::Flow => self.engine.renderer().nodes().len(),
        }
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.visible_count(self.current_view).saturating_sub(1);
        let index = self.selected_index_mut();
        *index = (*index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        let index = self.selected_index_mut();
        *index = index.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        *self.selected_index_mut() = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        let last = self.visible_count(self.current_view).saturating_sub(1);
        *self.selected_index_mut() = last;
    }

    /// Scroll offset the table for `view` was last drawn with.
    pub fn table_offset(&self, view: View) -> usize {
        match view {
            View::Services => self.services_offset.get(),
            View::Dependencies => self.dependencies_offset.get(),
            View::Flow => 0,
        }
    }

    pub fn set_table_offset(&self, view: View, offset: usize) {
        match view {
            View::Services => self.services_offset.set(offset),
            View::Dependencies => self.dependencies_offset.set(offset),
            View::Flow => {}
        }
    }

    /// Select the row drawn `row` lines below the top of the table.
    ///
    /// Returns false for rows past the end.
    pub fn select_row(&mut self, row: usize) -> bool {
        let row = row + self.table_offset(self.current_view);
        if row >= self.visible_count(self.current_view) {
            return false;
        }
        *self.selected_index_mut() = row;
        true
    }

    /// Services and Flow share the service cursor.
    fn selected_index_mut(&mut self) -> &mut usize {
        match self.current_view {
            View::Services | View::Flow => &mut self.selected_service_index,
            View::Dependencies => &mut self.selected_dependency_index,
        }
    }

    /// Tap the element under the cursor.
    pub fn tap_selected(&mut self) {
        let target = match self.current_view {
            View::Services => services::rows(self)
                .into_iter()
                .nth(self.selected_service_index)
                .map(|row| (row.id, row.implicit, row.name)),
            View::Flow => self
                .engine
                .renderer()
                .nodes()
                .into_iter()
                .nth(self.selected_service_index)
                .map(|node| {
                    let implicit = node.is_implicit();
                    (ElementId::node(node.name.as_str()), implicit, node.name)
                }),
            View::Dependencies => dependencies::rows(self)
                .into_iter()
                .nth(self.selected_dependency_index)
                .map(|row| (row.id, false, format!("{} → {}", row.src, row.dst))),
        };

        let Some((id, implicit, name)) = target else {
            return;
        };
        if implicit {
            self.set_status_message(format!("{} has no metrics of its own", name));
            return;
        }
        self.bridge.on_tap(TapTarget::Element(id), &self.engine);
    }

    /// Tap empty canvas: clears the selection and the detail panel.
    pub fn tap_background(&mut self) {
        self.bridge.on_tap(TapTarget::Background, &self.engine);
    }

    pub fn detail_visible(&self) -> bool {
        self.bridge.panel().is_visible()
    }

    /// Navigate back: close the detail first, then return to Services.
    pub fn go_back(&mut self) {
        if self.detail_visible() {
            self.tap_background();
            return;
        }
        if self.current_view != View::Services {
            self.current_view = View::Services;
        }
    }

    /// Advance to the next observation window and forward it to the source.
    pub fn cycle_window(&mut self) {
        let next = WINDOW_CHOICES
            .iter()
            .copied()
            .find(|w| *w > self.window_sec)
            .unwrap_or(WINDOW_CHOICES[0]);
        self.window_sec = next;
        self.source.set_window(next);
        self.history.clear();
        info!(window_sec = next, "observation window changed");
        self.set_status_message(format!("Window: {}", window_label(next)));
    }

    /// Ask the source for fresh data now.
    pub fn request_refresh(&mut self) {
        self.source.request_refresh();
        self.reload_data();
        self.set_status_message("Refresh requested".to_string());
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Cycle to the next sort column for the current view.
    pub fn cycle_sort(&mut self) {
        match self.current_view {
            View::Services => self.sort_column = self.sort_column.next(),
            View::Dependencies => {
                self.dependency_sort_column = self.dependency_sort_column.next()
            }
            View::Flow => {}
        }
    }

    /// Toggle sort direction between ascending and descending.
    pub fn toggle_sort_direction(&mut self) {
        match self.current_view {
            View::Services => self.sort_ascending = !self.sort_ascending,
            View::Dependencies => {
                self.dependency_sort_ascending = !self.dependency_sort_ascending
            }
            View::Flow => {}
        }
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
        self.clamp_selection();
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
        self.clamp_selection();
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
        self.clamp_selection();
    }

    /// Check if a service name matches the current filter.
    pub fn matches_filter(&self, name: &str) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        name.to_lowercase().contains(&self.filter_text.to_lowercase())
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the displayed graph to a file.
    pub fn export_state(&self, path: &Path) -> anyhow::Result<()> {
        if self.last_updated.is_none() {
            anyhow::bail!("No data to export");
        }
        Export::build(self.engine.displayed_elements()).write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HealthTier;
    use crate::engine::DetailPayload;
    use crate::source::{
        status_channel, ChannelSource, EdgeDescriptor, GraphSnapshot, NodeDescriptor,
    };

    fn snapshot() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                NodeDescriptor::new("api", 100, 2).into(),
                NodeDescriptor::new("db", 100, 0).into(),
            ],
            edges: vec![
                EdgeDescriptor::new("web", "api", 100, 2, 12.0).into(),
                EdgeDescriptor::new("api", "db", 100, 0, 3.0).into(),
            ],
        }
    }

    fn app_with(snapshot: GraphSnapshot) -> (tokio::sync::watch::Sender<GraphSnapshot>, App) {
        let (tx, source) = ChannelSource::create("test");
        tx.send(snapshot).unwrap();
        let (_sink, status) = status_channel(ConnectionStatus::Connected);
        let app = App::new(
            Box::new(source),
            GraphEngine::new(TuiGraph::new()),
            status,
            60,
            Theme::dark(),
        );
        (tx, app)
    }

    #[test]
    fn test_view_cycle() {
        assert_eq!(View::Services.next(), View::Dependencies);
        assert_eq!(View::Services.prev(), View::Flow);
        assert_eq!(View::Flow.next().label(), "Services");
    }

    #[test]
    fn test_window_label() {
        assert_eq!(window_label(30), "30s");
        assert_eq!(window_label(300), "5m");
        assert_eq!(window_label(90), "90s");
    }

    #[test]
    fn test_reload_applies_snapshot() {
        let (_tx, mut app) = app_with(snapshot());
        assert!(app.reload_data());
        assert!(!app.reload_data());

        assert_eq!(app.engine.displayed_len(), 4);
        let (services, calls) = app.tier_counts();
        assert_eq!(services.total, 2);
        assert_eq!(services.warning, 1);
        assert_eq!(calls.total, 2);
        assert!(app.last_updated.is_some());
        assert_eq!(app.connection_status(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_tap_opens_and_esc_closes_detail() {
        let (_tx, mut app) = app_with(snapshot());
        app.reload_data();

        // Layout order: web (implicit), api, db
        app.select_row(1);
        app.tap_selected();
        assert!(app.detail_visible());
        match app.bridge.panel().payload() {
            Some(DetailPayload::Node { name, tier, .. }) => {
                assert_eq!(name, "api");
                assert_eq!(*tier, HealthTier::Warning);
            }
            other => panic!("unexpected payload {:?}", other),
        }

        app.go_back();
        assert!(!app.detail_visible());
        assert!(app.bridge.selection().selected().is_none());
    }

    #[test]
    fn test_implicit_service_has_no_detail() {
        let (_tx, mut app) = app_with(snapshot());
        app.reload_data();

        app.select_row(0);
        app.tap_selected();
        assert!(!app.detail_visible());
        assert!(app.get_status_message().unwrap().contains("web"));
    }

    #[test]
    fn test_dependency_tap_and_removal() {
        let (tx, mut app) = app_with(snapshot());
        app.reload_data();

        app.set_view(View::Dependencies);
        app.select_first();
        app.tap_selected();
        // Worst tier first
        assert_eq!(
            app.bridge.selection().selected(),
            Some(&ElementId::edge("web", "api"))
        );

        tx.send(GraphSnapshot {
            nodes: vec![NodeDescriptor::new("db", 1, 0).into()],
            edges: vec![],
        })
        .unwrap();
        app.reload_data();
        assert!(!app.detail_visible());
        assert_eq!(app.selected_dependency_index, 0);
    }

    #[test]
    fn test_cycle_window() {
        let (_tx, mut app) = app_with(snapshot());
        app.cycle_window();
        assert_eq!(app.window_sec, 300);
        app.cycle_window();
        app.cycle_window();
        assert_eq!(app.window_sec, 30);
    }

    #[test]
    fn test_filter_and_selection_clamp() {
        let (_tx, mut app) = app_with(snapshot());
        app.reload_data();
        app.select_last();
        assert_eq!(app.selected_service_index, 2);

        for c in "db".chars() {
            app.filter_push(c);
        }
        assert_eq!(app.selected_service_index, 0);
        assert!(!app.select_row(1));
    }

    #[test]
    fn test_export_requires_data() {
        let (_tx, mut app) = app_with(snapshot());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        assert!(app.export_state(&path).is_err());

        app.reload_data();
        app.export_state(&path).unwrap();
        assert!(path.exists());
    }
}
