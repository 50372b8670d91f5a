//! Dashboard rendering with ratatui.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::state::{DashboardState, PhaseView};
use crate::sampler::Phase;

/// Color for a speed value.
///
/// Green at 100 Mbps and up, yellow from 25, red below.
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 100.0 {
        Color::Green
    } else if speed_mbps >= 25.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Color for a latency value.
pub fn latency_color(latency_ms: f64) -> Color {
    if latency_ms <= 50.0 {
        Color::Green
    } else if latency_ms <= 100.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn format_speed(speed_mbps: f64) -> String {
    format!("{:.2} Mbps", speed_mbps)
}

pub fn format_latency(latency_ms: f64) -> String {
    format!("{:.2} ms", latency_ms)
}

/// Gauge label for one phase's current state.
pub fn phase_label(phase: Phase, view: &PhaseView) -> String {
    if view.failed() {
        return format!("{} failed", phase);
    }
    match view.result {
        Some(result) if phase == Phase::Ping => {
            format!("ping {}", format_latency(result.value))
        }
        Some(result) => format!("{} {}", phase, format_speed(result.value)),
        None => format!("{} {}%", phase, view.percent),
    }
}

pub fn render_frame(frame: &mut Frame, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Metadata
            Constraint::Length(3), // Ping
            Constraint::Length(3), // Download
            Constraint::Length(3), // Upload
            Constraint::Length(1), // Status bar
            Constraint::Min(0),
        ])
        .split(frame.area());

    render_metadata(frame, chunks[0], state);
    render_phase_gauge(frame, chunks[1], Phase::Ping, state);
    render_phase_gauge(frame, chunks[2], Phase::Download, state);
    render_phase_gauge(frame, chunks[3], Phase::Upload, state);
    render_status_bar(frame, chunks[4], state);
}

fn render_metadata(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![Line::from(vec![
        Span::styled(
            "Server: ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(state.server_label.clone(), Style::default().fg(Color::Cyan)),
    ])];

    if let Some(ref network) = state.network_label {
        lines.push(Line::from(vec![
            Span::styled(
                "Network: ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(network.clone(), Style::default().fg(Color::Cyan)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_phase_gauge(
    frame: &mut Frame,
    area: Rect,
    phase: Phase,
    state: &DashboardState,
) {
    let view = state.view(phase);

    let color = if view.failed() {
        Color::Red
    } else {
        match view.result {
            Some(result) if phase == Phase::Ping => latency_color(result.value),
            Some(result) => speed_color(result.value),
            None if state.active_phase == Some(phase) => Color::Cyan,
            None => Color::DarkGray,
        }
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(format!("{}", phase)))
        .gauge_style(Style::default().fg(color))
        .percent(u16::from(view.percent))
        .label(phase_label(phase, view));

    frame.render_widget(gauge, area);
}

fn render_status_bar(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let line = if let Some(ref error) = state.error {
        Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
    } else if state.completed {
        Line::from(Span::styled(
            "Done. Press q to quit.",
            Style::default().fg(Color::Green),
        ))
    } else if let Some(phase) = state.active_phase {
        Line::from(Span::styled(
            format!("Running {} test...", phase),
            Style::default().fg(Color::Cyan),
        ))
    } else {
        Line::from(Span::styled(
            "Starting...",
            Style::default().fg(Color::DarkGray),
        ))
    };

    frame.render_widget(Paragraph::new(line), area);
}
