use std::collections::HashMap;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::{format_error_rate, ElementMetrics, HealthTier};

/// Calls and tier of one edge, keyed by (caller, callee) name.
type EdgeMap<'a> = HashMap<(&'a str, &'a str), (HealthTier, u64, u64)>;

fn edge_map(app: &App) -> EdgeMap<'_> {
    app.engine
        .displayed_elements()
        .filter_map(|element| match &element.metrics {
            ElementMetrics::Edge(m) => Some((
                (m.src.as_str(), m.dst.as_str()),
                (element.tier, m.call_count, m.error_count),
            )),
            ElementMetrics::Node(_) => None,
        })
        .collect()
}

/// Render the caller/callee matrix, rows calling columns, in layout order.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let nodes = app.engine.renderer().nodes();
    let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();

    if names.is_empty() {
        let block = Block::default()
            .title(" Call Flow ")
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border));
        let paragraph = Paragraph::new("No services loaded").block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let edges = edge_map(app);
    let selected_index = app.selected_service_index.min(names.len() - 1);

    // Column width adapts to terminal width and service count
    let row_header_w = 14usize;
    let matrix_overhead = row_header_w + 4;
    let remaining_for_cols = (area.width as usize).saturating_sub(matrix_overhead);
    let col_w = (remaining_for_cols / names.len()).clamp(4, 10);

    let matrix_height = (names.len() + 3).min(area.height as usize / 2);

    let chunks = Layout::vertical([
        Constraint::Length(matrix_height as u16 + 2),
        Constraint::Min(6),
    ])
    .split(area);

    // ===== MATRIX =====
    let mut matrix_lines: Vec<Line> = Vec::new();

    let mut header: Vec<Span> = vec![
        Span::raw(format!("{:row_header_w$}", "")),
        Span::styled("│", Style::default().fg(app.theme.border)),
    ];
    for (i, name) in names.iter().enumerate() {
        let style = if i == selected_index {
            Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        header.push(Span::styled(
            format!("{:^col_w$}", truncate(name, col_w - 1)),
            style,
        ));
    }
    header.push(Span::styled("│", Style::default().fg(app.theme.border)));
    matrix_lines.push(Line::from(header));

    let matrix_width = col_w * names.len();
    matrix_lines.push(Line::from(vec![Span::styled(
        format!("{:─<row_header_w$}┼{:─<matrix_width$}┤", "", ""),
        Style::default().fg(app.theme.border),
    )]));

    for (row_idx, (row_name, node)) in names.iter().zip(&nodes).enumerate() {
        let row_style = if row_idx == selected_index {
            Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD)
        } else if node.is_implicit() {
            Style::default().add_modifier(Modifier::DIM)
        } else {
            Style::default()
        };

        let mut row: Vec<Span> = vec![
            Span::styled(
                format!("{:>row_header_w$}", truncate(row_name, row_header_w - 1)),
                row_style,
            ),
            Span::styled("│", Style::default().fg(app.theme.border)),
        ];

        for (col_idx, col_name) in names.iter().enumerate() {
            let cell = if row_idx == col_idx {
                match edges.get(&(*row_name, *row_name)) {
                    Some((tier, _, _)) => ("↺".to_string(), app.theme.tier_style(*tier)),
                    None => ("·".to_string(), Style::default().add_modifier(Modifier::DIM)),
                }
            } else {
                match edges.get(&(*row_name, *col_name)) {
                    Some((tier, _, _)) => (tier.symbol().to_string(), app.theme.tier_style(*tier)),
                    None => (String::new(), Style::default()),
                }
            };
            row.push(Span::styled(format!("{:^col_w$}", cell.0), cell.1));
        }

        row.push(Span::styled("│", Style::default().fg(app.theme.border)));
        matrix_lines.push(Line::from(row));
    }

    matrix_lines.push(Line::from(vec![Span::styled(
        format!("{:─<row_header_w$}┴{:─<matrix_width$}╯", "", ""),
        Style::default().fg(app.theme.border),
    )]));

    let matrix_block = Block::default()
        .title(format!(" Call Flow ({} services) ", names.len()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));
    frame.render_widget(Paragraph::new(matrix_lines).block(matrix_block), chunks[0]);

    // ===== CONNECTIONS OF THE SELECTED SERVICE =====
    let details_width = chunks[1].width.saturating_sub(2) as usize;
    let mut detail_lines: Vec<Line> = vec![
        Line::from(vec![
            Span::styled(" Legend: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("row calls column, coloured by the call's tier  "),
            Span::styled("↺", Style::default().fg(app.theme.highlight)),
            Span::raw(" self call"),
        ]),
        Line::from(""),
    ];

    let selected = names[selected_index];
    let mut outgoing: Vec<(&str, &(HealthTier, u64, u64))> = edges
        .iter()
        .filter(|((src, _), _)| *src == selected)
        .map(|((_, dst), stats)| (*dst, stats))
        .collect();
    outgoing.sort_by_key(|(name, _)| *name);
    let mut incoming: Vec<(&str, &(HealthTier, u64, u64))> = edges
        .iter()
        .filter(|((_, dst), _)| *dst == selected)
        .map(|((src, _), stats)| (*src, stats))
        .collect();
    incoming.sort_by_key(|(name, _)| *name);

    detail_lines.push(Line::from(vec![
        Span::styled(
            format!(" {} ", selected),
            Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD),
        ),
        Span::styled("│ ", Style::default().fg(app.theme.border)),
        Span::raw(format!("{} out  {} in", outgoing.len(), incoming.len())),
    ]));
    detail_lines.push(Line::from(vec![Span::styled(
        format!(" {:─<w$}", "", w = details_width.saturating_sub(2)),
        Style::default().fg(app.theme.border),
    )]));

    let connection = |arrow: &'static str, peer: &str, stats: &(HealthTier, u64, u64)| {
        let (tier, calls, errors) = *stats;
        Line::from(vec![
            Span::styled(format!(" {} ", arrow), app.theme.tier_style(tier)),
            Span::raw(format!("{:<24}", truncate(peer, 24))),
            Span::styled(
                format!("{} calls, {}% errors", calls, format_error_rate(errors, calls)),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ])
    };
    for &(peer, stats) in &outgoing {
        detail_lines.push(connection("→", peer, stats));
    }
    for &(peer, stats) in &incoming {
        detail_lines.push(connection("←", peer, stats));
    }
    if outgoing.is_empty() && incoming.is_empty() {
        detail_lines.push(Line::from(vec![Span::styled(
            "   (no calls in this window)",
            Style::default().add_modifier(Modifier::DIM),
        )]));
    }

    let details_block = Block::default()
        .title(" Connections ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    frame.render_widget(Paragraph::new(detail_lines).block(details_block), chunks[1]);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}
