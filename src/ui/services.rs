//! Services view rendering.
//!
//! Displays a table of every service in layout order with health tier,
//! call counts, call rate and a sparkline trend.

use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::{App, View};
use crate::data::{ElementId, ElementMetrics, HealthTier};
use crate::ui::common::format_count;

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Column to sort by in the Services view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    /// Layout order: call depth, then position within the rank.
    #[default]
    Layout,
    Name,
    Calls,
    Errors,
    Tier,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Layout => SortColumn::Name,
            SortColumn::Name => SortColumn::Calls,
            SortColumn::Calls => SortColumn::Errors,
            SortColumn::Errors => SortColumn::Tier,
            SortColumn::Tier => SortColumn::Layout,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortColumn::Layout => "layout",
            SortColumn::Name => "name",
            SortColumn::Calls => "calls",
            SortColumn::Errors => "errors",
            SortColumn::Tier => "tier",
        }
    }
}

/// One row of the Services table.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRow {
    pub id: ElementId,
    pub name: String,
    pub tier: HealthTier,
    /// Position in layout order.
    pub position: usize,
    pub calls: Option<u64>,
    pub errors: Option<u64>,
    pub error_rate: Option<String>,
    /// Known only as an edge endpoint.
    pub implicit: bool,
}

/// Visible rows: filtered and sorted the way the table shows them.
pub fn rows(app: &App) -> Vec<ServiceRow> {
    let mut rows: Vec<ServiceRow> = app
        .engine
        .renderer()
        .nodes()
        .into_iter()
        .enumerate()
        .filter(|(_, node)| app.matches_filter(&node.name))
        .map(|(position, node)| {
            let metrics = node.descriptor.and_then(|d| match &d.metrics {
                ElementMetrics::Node(m) => Some(m),
                ElementMetrics::Edge(_) => None,
            });
            ServiceRow {
                id: ElementId::node(node.name.as_str()),
                implicit: node.is_implicit(),
                tier: node.tier,
                position,
                calls: metrics.map(|m| m.total_calls),
                errors: metrics.map(|m| m.total_errors),
                error_rate: metrics.map(|m| m.error_rate.clone()),
                name: node.name,
            }
        })
        .collect();
    sort_rows_by(&mut rows, app.sort_column, app.sort_ascending);
    rows
}

/// Sort rows by the given column and direction.
pub fn sort_rows_by(rows: &mut [ServiceRow], column: SortColumn, ascending: bool) {
    rows.sort_by(|a, b| {
        let primary = match column {
            SortColumn::Layout => a.position.cmp(&b.position),
            SortColumn::Name => a.name.cmp(&b.name),
            SortColumn::Calls => a.calls.cmp(&b.calls),
            SortColumn::Errors => a.errors.cmp(&b.errors),
            SortColumn::Tier => a.tier.cmp(&b.tier),
        };

        let primary = if ascending {
            primary
        } else {
            primary.reverse()
        };

        // Secondary sort by name for stability
        if primary == Ordering::Equal {
            a.name.cmp(&b.name)
        } else {
            primary
        }
    });
}

/// Render the Services view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = rows(app);
    let total = app.engine.renderer().nodes().len();

    let header = Row::new(vec![
        Cell::from(format_header("Service", SortColumn::Name, app)),
        Cell::from(format_header("Depth", SortColumn::Layout, app)),
        Cell::from(format_header("Calls", SortColumn::Calls, app)),
        Cell::from("Rate"),
        Cell::from(format_header("Errors", SortColumn::Errors, app)),
        Cell::from("Err %"),
        Cell::from("Trend"),
        Cell::from(format_header("Tier", SortColumn::Tier, app)),
    ])
    .height(1)
    .style(app.theme.header);

    let graph = app.engine.renderer();
    let table_rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            let tier_style = app.theme.tier_style(row.tier);
            let depth = graph
                .slot(&row.id.wire())
                .map(|s| s.rank.to_string())
                .unwrap_or_else(|| "-".to_string());
            let rate = app
                .history
                .call_rate(&row.name)
                .map(|r| format!("{:.1}/s", r))
                .unwrap_or_else(|| "-".to_string());
            let sparkline = render_sparkline(&app.history.calls_sparkline(&row.name));
            let dash = || "-".to_string();

            let cells = Row::new(vec![
                Cell::from(row.name.clone()),
                Cell::from(depth),
                Cell::from(row.calls.map(format_count).unwrap_or_else(dash)),
                Cell::from(rate),
                Cell::from(row.errors.map(format_count).unwrap_or_else(dash)),
                Cell::from(row.error_rate.clone().unwrap_or_else(dash)).style(tier_style),
                Cell::from(sparkline),
                Cell::from(format!("{} {}", row.tier.symbol(), row.tier.label())).style(tier_style),
            ]);
            if row.implicit {
                cells.style(Style::default().add_modifier(Modifier::DIM))
            } else {
                cells
            }
        })
        .collect();

    let widths = [
        Constraint::Fill(3), // Service
        Constraint::Length(6),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Length(7),
        Constraint::Min(8), // Sparkline
        Constraint::Min(11),
    ];

    let selected_visual_index = app.selected_service_index.min(rows.len().saturating_sub(1));
    let sort_dir = if app.sort_ascending { "↑" } else { "↓" };

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !rows.is_empty() {
        format!(" [{}/{}]", selected_visual_index + 1, rows.len())
    } else {
        String::new()
    };

    let title = format!(
        " Services ({}/{}) [s:sort {}{}]{}{} ",
        rows.len(),
        total,
        app.sort_column.label(),
        sort_dir,
        filter_info,
        position_info
    );

    let table = Table::new(table_rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default().with_offset(app.table_offset(View::Services));
    if !rows.is_empty() {
        state.select(Some(selected_visual_index));
    }

    frame.render_stateful_widget(table, area, &mut state);
    app.set_table_offset(View::Services, state.offset());
}

fn format_header(name: &str, col: SortColumn, app: &App) -> Span<'static> {
    if app.sort_column == col {
        let arrow = if app.sort_ascending { "↑" } else { "↓" };
        Span::raw(format!("{}{}", name, arrow))
    } else {
        Span::raw(name.to_string())
    }
}

fn render_sparkline(data: &[u8]) -> String {
    if data.is_empty() {
        return "        ".to_string(); // 8 spaces placeholder
    }

    let values: Vec<u8> = data.iter().rev().take(8).rev().copied().collect();
    values.iter().map(|&v| SPARKLINE_CHARS[v.min(7) as usize]).collect()
}
