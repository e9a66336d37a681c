use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{App, View};
use crate::data::{format_error_rate, ElementId, ElementMetrics, HealthTier};
use crate::ui::common::format_count;

/// Column to sort call relationships by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencySortColumn {
    #[default]
    Tier,
    Caller,
    Callee,
    Calls,
    Errors,
    P95,
}

impl DependencySortColumn {
    pub fn next(self) -> Self {
        match self {
            Self::Tier => Self::Caller,
            Self::Caller => Self::Callee,
            Self::Callee => Self::Calls,
            Self::Calls => Self::Errors,
            Self::Errors => Self::P95,
            Self::P95 => Self::Tier,
        }
    }
}

/// One displayed call relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRow {
    pub id: ElementId,
    pub src: String,
    pub dst: String,
    pub tier: HealthTier,
    pub calls: u64,
    pub errors: u64,
    pub p95_ms: f64,
}

/// Visible rows, filtered on either endpoint and sorted.
pub fn rows(app: &App) -> Vec<DependencyRow> {
    let mut rows: Vec<DependencyRow> = app
        .engine
        .displayed_elements()
        .filter_map(|element| match &element.metrics {
            ElementMetrics::Edge(m) => Some(DependencyRow {
                id: element.id.clone(),
                src: m.src.clone(),
                dst: m.dst.clone(),
                tier: element.tier,
                calls: m.call_count,
                errors: m.error_count,
                p95_ms: m.p95_ms,
            }),
            ElementMetrics::Node(_) => None,
        })
        .filter(|row| app.matches_filter(&row.src) || app.matches_filter(&row.dst))
        .collect();
    sort_dependencies(
        &mut rows,
        app.dependency_sort_column,
        app.dependency_sort_ascending,
    );
    rows
}

/// Render the call relationships as a table
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = rows(app);

    if rows.is_empty() {
        render_empty_message(frame, app, area);
        return;
    }

    let critical_count = rows.iter().filter(|r| r.tier == HealthTier::Critical).count();
    let warning_count = rows.iter().filter(|r| r.tier == HealthTier::Warning).count();

    let header = Row::new(vec![
        Cell::from(format_header("Tier", DependencySortColumn::Tier, app)),
        Cell::from(format_header("Caller", DependencySortColumn::Caller, app)),
        Cell::from(format_header("Callee", DependencySortColumn::Callee, app)),
        Cell::from(format_header("Calls", DependencySortColumn::Calls, app)),
        Cell::from(format_header("Errors", DependencySortColumn::Errors, app)),
        Cell::from("Err %"),
        Cell::from(format_header("p95", DependencySortColumn::P95, app)),
    ])
    .height(1)
    .style(app.theme.header);

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            let tier_style = app.theme.tier_style(row.tier);
            let tier_label = match row.tier {
                HealthTier::Critical => "CRIT",
                HealthTier::Warning => "WARN",
                HealthTier::Good => "OK",
                HealthTier::Unknown => "-",
            };

            Row::new(vec![
                Cell::from(tier_label).style(tier_style),
                Cell::from(row.src.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(row.dst.clone()),
                Cell::from(format_count(row.calls)),
                Cell::from(format_count(row.errors)).style(tier_style),
                Cell::from(format_error_rate(row.errors, row.calls)).style(tier_style),
                Cell::from(format!("{:.1}ms", row.p95_ms)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(7),
        Constraint::Length(10),
    ];

    let sort_indicator = match app.dependency_sort_column {
        DependencySortColumn::Tier => "tier",
        DependencySortColumn::Caller => "caller",
        DependencySortColumn::Callee => "callee",
        DependencySortColumn::Calls => "calls",
        DependencySortColumn::Errors => "errors",
        DependencySortColumn::P95 => "p95",
    };
    let sort_dir = if app.dependency_sort_ascending {
        "↑"
    } else {
        "↓"
    };

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let selected = app.selected_dependency_index.min(rows.len().saturating_sub(1));
    let title = format!(
        " Dependencies ({} crit, {} warn) [s:sort {}{}]{} [{}/{}] ",
        critical_count,
        warning_count,
        sort_indicator,
        sort_dir,
        filter_info,
        selected + 1,
        rows.len()
    );

    let border_color = if critical_count > 0 {
        app.theme.critical
    } else if warning_count > 0 {
        app.theme.warning
    } else {
        app.theme.border
    };

    let table = Table::new(table_rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(border_color)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default()
        .with_offset(app.table_offset(View::Dependencies))
        .with_selected(Some(selected));

    frame.render_stateful_widget(table, area, &mut state);
    app.set_table_offset(View::Dependencies, state.offset());
}

fn render_empty_message(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Dependencies ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let message = if app.filter_text.is_empty() {
        "      No calls observed in this window."
    } else {
        "      No calls match the filter."
    };

    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(vec![Span::styled(
            message,
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn format_header(name: &str, col: DependencySortColumn, app: &App) -> Span<'static> {
    if app.dependency_sort_column == col {
        let arrow = if app.dependency_sort_ascending {
            "↑"
        } else {
            "↓"
        };
        Span::raw(format!("{}{}", name, arrow))
    } else {
        Span::raw(name.to_string())
    }
}

pub fn sort_dependencies(rows: &mut [DependencyRow], column: DependencySortColumn, ascending: bool) {
    rows.sort_by(|a, b| {
        let primary = match column {
            DependencySortColumn::Tier => a.tier.cmp(&b.tier),
            DependencySortColumn::Caller => a.src.to_lowercase().cmp(&b.src.to_lowercase()),
            DependencySortColumn::Callee => a.dst.to_lowercase().cmp(&b.dst.to_lowercase()),
            DependencySortColumn::Calls => a.calls.cmp(&b.calls),
            DependencySortColumn::Errors => a.errors.cmp(&b.errors),
            DependencySortColumn::P95 => a.p95_ms.total_cmp(&b.p95_ms),
        };

        let primary = if ascending {
            primary
        } else {
            primary.reverse()
        };

        // Secondary sort by caller, then callee
        if primary == Ordering::Equal {
            a.src.cmp(&b.src).then_with(|| a.dst.cmp(&b.dst))
        } else {
            primary
        }
    });
}
