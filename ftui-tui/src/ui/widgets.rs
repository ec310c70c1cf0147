use chrono::Duration;
use ftui_data::view::PanelState;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row},
};

/// Bordered block for one panel, with the refresh failure notice along the bottom edge.
pub fn panel_block(title: &str, state: &PanelState) -> Block<'static> {
    let border = match state {
        _ if state.is_unauthorized() => Color::Red,
        PanelState::Failed(_) | PanelState::Stale(_) => Color::Yellow,
        PanelState::Loading | PanelState::Fresh(_) => Color::White,
    };

    let block = Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    match state.notice() {
        Some(notice) => block.title_bottom(Line::from(Span::styled(
            format!(" {notice} "),
            Style::default().fg(border),
        ))),
        None => block,
    }
}

/// Text shown in place of a panel's rows when there is nothing to draw.
pub fn placeholder<'a>(what: &str, state: &PanelState, block: Block<'a>) -> Paragraph<'a> {
    let line = match state.error() {
        Some(error) if state.payload().is_none() => Line::from(Span::styled(
            format!("No {what} data: {error}"),
            Style::default().fg(Color::Red),
        )),
        _ if state.is_loading() => Line::from(Span::styled(
            format!("Waiting for {what} data..."),
            Style::default().fg(Color::DarkGray),
        )),
        _ => Line::from(Span::styled(
            format!("No {what}"),
            Style::default().fg(Color::DarkGray),
        )),
    };
    Paragraph::new(line).block(block)
}

pub fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.iter().map(|title| {
        Cell::from(*title).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .height(1)
}

pub fn profit_style(value: f64) -> Style {
    if value > 0.0 {
        Style::default().fg(Color::Green)
    } else if value < 0.0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    }
}

pub fn profit_cell(value: f64, suffix: &str) -> Cell<'static> {
    Cell::from(format!("{value:.2}{suffix}")).style(profit_style(value))
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

/// `1d 02:03` above a day, `02:03:04` below.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rest / 3_600, rest % 3_600 / 60, rest % 60);
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

pub fn format_opt(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|value| format!("{value:.2}{suffix}"))
        .unwrap_or_else(|| "-".to_string())
}

/// Clamp a cursor to the rows actually drawn.
pub fn clamp_selection(selected: usize, len: usize) -> Option<usize> {
    len.checked_sub(1).map(|last| selected.min(last))
}

/// Rect of the given percentage size centred inside `area`.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        struct TestCase {
            input: Duration,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: under a minute
                input: Duration::seconds(42),
                expected: "00:00:42",
            },
            TestCase {
                // TC1: hours
                input: Duration::seconds(3 * 3_600 + 5 * 60 + 9),
                expected: "03:05:09",
            },
            TestCase {
                // TC2: days drop the seconds
                input: Duration::seconds(86_400 + 2 * 3_600 + 3 * 60 + 4),
                expected: "1d 02:03",
            },
            TestCase {
                // TC3: negative clamps to zero
                input: Duration::seconds(-5),
                expected: "00:00:00",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = format_duration(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_clamp_selection() {
        assert_eq!(clamp_selection(0, 0), None);
        assert_eq!(clamp_selection(5, 3), Some(2));
        assert_eq!(clamp_selection(1, 3), Some(1));
    }

    #[test]
    fn test_centered_rect_is_inside_area() {
        let area = Rect::new(0, 0, 100, 50);
        let popup = centered_rect(60, 40, area);
        assert_eq!(popup.width, 60);
        assert_eq!(popup.height, 20);
        assert_eq!(popup.x, 20);
        assert_eq!(popup.y, 15);
    }
}
