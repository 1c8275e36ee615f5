//! Status panel view.
//!
//! Rendering is a pure function of the status and the spinner tick.

use gemlink_core::AuthStatus;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::state::{Indicator, PanelView, panel_view};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const PANEL_WIDTH: u16 = 60;
const PANEL_HEIGHT: u16 = 9;

pub fn indicator_symbol(indicator: Indicator, tick: usize) -> &'static str {
    match indicator {
        Indicator::Progress => SPINNER_FRAMES[tick % SPINNER_FRAMES.len()],
        Indicator::Success => "✓",
        Indicator::Warning => "!",
        Indicator::Error => "✗",
    }
}

pub fn indicator_color(indicator: Indicator) -> Color {
    match indicator {
        Indicator::Progress => Color::Cyan,
        Indicator::Success => Color::Green,
        Indicator::Warning => Color::Yellow,
        Indicator::Error => Color::Red,
    }
}

/// Renders the panel centered in `area`. Unknown statuses draw nothing.
pub fn render_status_panel(frame: &mut Frame, area: Rect, status: Option<AuthStatus>, tick: usize) {
    let Some(view) = panel_view(status) else {
        return;
    };

    let panel_area = centered_area(area, PANEL_WIDTH, PANEL_HEIGHT);
    let color = indicator_color(view.indicator);

    frame.render_widget(Clear, panel_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(" Authentication ")
        .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD));
    let inner = block.inner(panel_area);
    frame.render_widget(block, panel_area);

    let inner = Rect::new(
        inner.x + 1,
        inner.y,
        inner.width.saturating_sub(2),
        inner.height,
    );
    let para = Paragraph::new(status_panel_lines(&view, tick)).wrap(Wrap { trim: true });
    frame.render_widget(para, inner);
}

/// Builds the panel body for a view.
pub fn status_panel_lines(view: &PanelView, tick: usize) -> Vec<Line<'static>> {
    let color = indicator_color(view.indicator);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                indicator_symbol(view.indicator, tick),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                view.title,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(view.message, Style::default().fg(Color::White))),
    ];

    if let Some(control) = view.control {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(
                format!("[ {} ]", control.label),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", control.keys),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    lines
}

fn centered_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
