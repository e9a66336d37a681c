//! Detail overlay rendering.
//!
//! [`DetailPane`] is the [`DetailPanel`] the selection bridge writes to; the
//! overlay is drawn whenever it holds a payload.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::engine::{DetailPanel, DetailPayload};
use crate::ui::common::format_count;

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 44;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 10;

/// Detail panel state.
#[derive(Debug, Default)]
pub struct DetailPane {
    payload: Option<DetailPayload>,
}

impl DetailPane {
    pub fn is_visible(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&self) -> Option<&DetailPayload> {
        self.payload.as_ref()
    }
}

impl DetailPanel for DetailPane {
    fn show_details(&mut self, payload: DetailPayload) {
        self.payload = Some(payload);
    }

    fn hide_details(&mut self) {
        self.payload = None;
    }
}

/// Render the selected element as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }
    let Some(payload) = app.bridge.panel().payload() else {
        return;
    };

    let overlay_width = (area.width * 60 / 100).clamp(MIN_OVERLAY_WIDTH, 72);
    let overlay_height = MIN_OVERLAY_HEIGHT;
    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([Constraint::Min(4), Constraint::Length(1)]).split(overlay_area);

    let tier = payload.tier();
    let tier_style = app.theme.tier_style(tier);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let (title, heading, counts) = match payload {
        DetailPayload::Node {
            name,
            total_calls,
            total_errors,
            ..
        } => (
            " Service ",
            name.clone(),
            vec![
                Span::raw(" Calls: "),
                Span::styled(format_count(*total_calls), bold),
                Span::raw("    Errors: "),
                Span::styled(format_count(*total_errors), bold),
            ],
        ),
        DetailPayload::Edge {
            src,
            dst,
            call_count,
            error_count,
            p95_ms,
            ..
        } => (
            " Call ",
            format!("{} → {}", src, dst),
            vec![
                Span::raw(" Calls: "),
                Span::styled(format_count(*call_count), bold),
                Span::raw("    Errors: "),
                Span::styled(format_count(*error_count), bold),
                Span::raw("    p95: "),
                Span::styled(format!("{:.2}ms", p95_ms), bold),
            ],
        ),
    };

    let lines = vec![
        Line::from(Span::styled(format!(" {} ", heading), bold)),
        Line::from(""),
        Line::from(counts),
        Line::from(vec![
            Span::raw(" Error rate: "),
            Span::styled(format!("{}%", payload.error_rate()), tier_style),
            Span::raw("    Status: "),
            Span::styled(
                format!("{} {}", tier.symbol(), tier.label()),
                tier_style.add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    frame.render_widget(Paragraph::new(lines).block(block), chunks[0]);

    let footer = Paragraph::new(Line::from(vec![Span::styled(
        " Press Esc to close ",
        Style::default().add_modifier(Modifier::DIM),
    )]));
    frame.render_widget(footer, chunks[1]);
}
