//! UI rendering for the TUI.

use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};

use crate::cli::format::{format_age, phase_label};
use crate::core::reducer::JobPhase;

use super::app::{TuiApp, View};

/// Main render function - dispatches to view-specific renderers.
pub fn render(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer/help
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match &app.view {
        View::Dashboard => render_dashboard(frame, app, chunks[1]),
        View::Errors { scroll } => render_errors(frame, app, chunks[1], *scroll),
        View::Processed { selected } => render_processed(frame, app, chunks[1], *selected),
    }

    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let title = format!(
        "BULKCTL  {}  [{}]  {}",
        app.title,
        app.resource,
        phase_label(&app.data.progress.phase)
    );

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(block, area);
}

fn render_dashboard(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Status card
            Constraint::Length(3), // Gauge
            Constraint::Min(0),    // Stage, message, notice
        ])
        .split(area);

    render_status_card(frame, app, chunks[0]);
    render_gauge(frame, app, chunks[1]);
    render_progress_detail(frame, app, chunks[2]);
}

fn render_status_card(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("Bulk Update Status")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let Some(cached) = &app.data.status else {
        let text = Paragraph::new("  Loading...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let status = &cached.status;
    let age = format_age(cached.fetched_at, Utc::now());
    let freshness = if cached.stale {
        Span::styled(
            format!("  stale, updated {}", age),
            Style::default().fg(Color::Yellow),
        )
    } else {
        Span::styled(
            format!("  updated {}", age),
            Style::default().fg(Color::DarkGray),
        )
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("  Workspaces:      ", Style::default().fg(Color::Cyan)),
            Span::raw(status.total_workspaces.to_string()),
            freshness,
        ]),
        Line::from(vec![
            Span::styled("  With alt texts:  ", Style::default().fg(Color::Cyan)),
            Span::raw(status.workspaces_with_alt_texts.to_string()),
        ]),
        Line::from(vec![
            Span::styled("  Needing update:  ", Style::default().fg(Color::Cyan)),
            Span::raw(status.workspaces_needing_update.to_string()),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_gauge(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let progress = &app.data.progress;
    let (percentage, label) = match &progress.latest {
        Some(f) => (
            f.percentage.clamp(0.0, 100.0),
            format!("{:.0}%  {}/{}", f.percentage, f.current, f.total),
        ),
        None => (0.0, "no job".to_string()),
    };

    let color = match progress.phase {
        JobPhase::Completed => Color::Green,
        JobPhase::Failed { .. } => Color::Red,
        JobPhase::Incomplete | JobPhase::Cancelled => Color::Yellow,
        JobPhase::Idle | JobPhase::Running => Color::Cyan,
    };

    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .ratio(percentage / 100.0)
        .label(label);

    frame.render_widget(gauge, area);
}

fn render_progress_detail(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let progress = &app.data.progress;
    let mut lines = Vec::new();

    if let Some(latest) = &progress.latest {
        lines.push(Line::from(vec![
            Span::styled("  Stage:    ", Style::default().fg(Color::Cyan)),
            Span::raw(latest.stage.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  Message:  ", Style::default().fg(Color::Cyan)),
            Span::raw(latest.message.clone()),
        ]));
        let error_style = if latest.errors.is_empty() {
            Style::default()
        } else {
            Style::default().fg(Color::Red)
        };
        lines.push(Line::from(vec![
            Span::styled("  Errors:   ", Style::default().fg(Color::Cyan)),
            Span::styled(latest.errors.len().to_string(), error_style),
            Span::raw(format!(
                "    Processed: {} ({} ok)",
                latest.processed.len(),
                latest.succeeded()
            )),
        ]));
    }

    if let JobPhase::Failed { reason } = &progress.phase {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Bulk update failed: {}", reason),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    if let Some(notice) = &app.notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Green),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_errors(frame: &mut Frame, app: &TuiApp, area: Rect, scroll: u16) {
    let block = Block::default()
        .title("Errors")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let errors = app.data.progress.errors();
    if errors.is_empty() {
        let text = Paragraph::new("  No errors reported")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let lines: Vec<Line> = errors
        .iter()
        .map(|e| Line::from(format!("  ✗ {}", e)))
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_processed(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let block = Block::default()
        .title("Processed")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let processed = app
        .data
        .progress
        .latest
        .as_ref()
        .map(|f| f.processed.as_slice())
        .unwrap_or(&[]);

    if processed.is_empty() {
        let text = Paragraph::new("  Nothing processed yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = processed
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let is_selected = i == selected;
            let style = if is_selected {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let icon = if item.success() {
                Span::styled("✓", Style::default().fg(Color::Green))
            } else {
                Span::styled("✗", Style::default().fg(Color::Red))
            };

            let mut spans = vec![
                Span::raw(if is_selected { "> " } else { "  " }),
                icon,
                Span::raw(format!("  {}", item.label())),
            ];
            if let Some(error) = item.error() {
                spans.push(Span::styled(
                    format!("  {}", error),
                    Style::default().fg(Color::Red),
                ));
            }

            ListItem::new(Line::from(spans)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let start_style = if app.can_start() {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut spans = match &app.view {
        View::Dashboard => vec![
            Span::styled("  [s] Start", start_style),
            Span::raw("  [x] Cancel  [r] Refresh  [e] Errors  [p] Processed  [q] Quit"),
        ],
        View::Errors { .. } | View::Processed { .. } => {
            vec![Span::raw("  [↑↓] Navigate  [Esc] Back  [q] Quit")]
        }
    };

    if let Some(error) = &app.error {
        spans.push(Span::styled(
            format!("  Error: {}", error),
            Style::default().fg(Color::Red),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}
