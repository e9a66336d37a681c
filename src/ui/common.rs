//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{window_label, App, View};
use crate::data::duration::format_duration;
use crate::data::TierCounts;
use crate::source::ConnectionStatus;

/// Render the header bar with the graph health overview.
///
/// Displays: overall tier, service counts by tier, call count, connection
/// status and the observation window.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let connection = app.connection_status();
    let connection_style = match connection {
        ConnectionStatus::Connected => Style::default().fg(app.theme.healthy),
        ConnectionStatus::Disconnected => Style::default().fg(app.theme.critical),
    };
    let window = Span::raw(format!(" │ window {}", window_label(app.window_sec)));

    if app.last_updated.is_none() {
        let line = Line::from(vec![
            Span::styled(" DEPVIZ ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Waiting for data... │ "),
            Span::styled(connection.label(), connection_style),
            window,
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let (services, calls) = app.tier_counts();
    let worst = services.worst().max(calls.worst());

    let mut spans = vec![
        Span::styled(" ● ", app.theme.tier_style(worst)),
        Span::styled("DEPVIZ ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
    ];
    spans.extend(tier_spans(app, &services));
    spans.extend([
        Span::raw("│ "),
        Span::styled(
            format!("{}", services.total),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" services "),
        Span::styled(
            format!("{}", calls.total),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" calls │ "),
        Span::styled(connection.label(), connection_style),
        window,
    ]);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn tier_spans(app: &App, counts: &TierCounts) -> Vec<Span<'static>> {
    let count = |n: usize, color| {
        if n > 0 {
            Span::styled(format!("{}", n), Style::default().fg(color))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        }
    };
    vec![
        count(counts.good, app.theme.healthy),
        Span::raw(" ok "),
        count(counts.warning, app.theme.warning),
        Span::raw(" warn "),
        if counts.critical > 0 {
            Span::styled(
                format!("{}", counts.critical),
                app.theme.tier_style(crate::data::HealthTier::Critical),
            )
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" crit "),
        count(counts.unknown, app.theme.unknown),
        Span::raw(" idle "),
    ]
}

/// Format a count for display (e.g., 1234 -> "1.2K", 1234567 -> "1.2M").
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![
        Line::from(" 1:Services "),
        Line::from(" 2:Dependencies "),
        Line::from(" 3:Flow "),
    ];

    let selected = match app.current_view {
        View::Services => 0,
        View::Dependencies => 1,
        View::Flow => 2,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: source, time since last update, available controls.
/// Also displays temporary status messages and errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    if let Some(ref err) = app.load_error {
        let paragraph = Paragraph::new(format!(
            " {} │ Error: {} | r:retry q:quit",
            app.source_description(),
            err
        ))
        .style(Style::default().fg(app.theme.critical));
        frame.render_widget(paragraph, area);
        return;
    }

    let status = if let Some(updated) = app.last_updated {
        let controls = if app.filter_active {
            "Type to search | Enter:apply Esc:cancel"
        } else if app.detail_visible() {
            "Esc:close ↑↓:move Enter:select ?:help q:quit"
        } else {
            match app.current_view {
                View::Services | View::Dependencies => {
                    "/:search s:sort w:window r:refresh Enter:detail ?:help q:quit"
                }
                View::Flow => "↑↓:select w:window Enter:detail ?:help q:quit",
            }
        };

        format!(
            " {} │ Updated {} ago | {}",
            app.source_description(),
            format_duration(updated.elapsed()),
            controls,
        )
    } else {
        format!(" {} │ Loading... | q:quit", app.source_description())
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  ←/→ h/l     Switch views"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter/click Show element detail"),
        Line::from("  Esc         Close detail / go back"),
        Line::from(""),
        section(" Services & Dependencies"),
        Line::from("  /         Start filter/search"),
        Line::from("  c         Clear filter"),
        Line::from("  s         Cycle sort column"),
        Line::from("  S         Toggle sort direction"),
        Line::from(""),
        section(" General"),
        Line::from("  w         Cycle window 30s/1m/5m/15m"),
        Line::from("  r         Refresh now"),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay, responsive to terminal size
    let help_width = 44u16.min(area.width.saturating_sub(4));
    let help_height = 26u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234), "1.2K");
        assert_eq!(format_count(2_500_000), "2.5M");
    }
}
