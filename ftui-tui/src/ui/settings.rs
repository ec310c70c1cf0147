use crate::{
    app::App,
    ui::widgets::{clamp_selection, header_row, selected_style},
};
use ftui_data::cache::SourceHealth;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(6)])
        .split(area);

    render_sources(f, app, chunks[0]);
    render_refresh(f, app, chunks[1]);
}

fn health_cell(health: SourceHealth) -> Cell<'static> {
    let (text, color) = match health {
        SourceHealth::Unknown => ("waiting".to_string(), Color::DarkGray),
        SourceHealth::Healthy => ("healthy".to_string(), Color::Green),
        SourceHealth::Degraded { failing, kind } => {
            (format!("{failing} failing ({kind})"), Color::Yellow)
        }
        SourceHealth::Unauthorized => ("unauthorized".to_string(), Color::Red),
    };
    Cell::from(text).style(Style::default().fg(color))
}

fn render_sources(f: &mut Frame, app: &App, area: Rect) {
    let cache = app.scheduler.cache();
    let sources: Vec<_> = app.scheduler.sources().iter().collect();
    let selected = clamp_selection(app.settings.selected, sources.len());

    let header = header_row(&["Bot", "URL", "Version", "Enabled", "Health", "Cached", "Last update"]);
    let rows = sources.iter().enumerate().map(|(index, remote)| {
        let snapshots = cache.snapshots(remote.name());
        let last_update = snapshots
            .iter()
            .filter_map(|snapshot| snapshot.last_success)
            .max()
            .map(|time| time.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let enabled = remote.is_enabled();

        let row = Row::new(vec![
            Cell::from(remote.name().to_string()).style(Style::default().fg(Color::Cyan)),
            Cell::from(remote.source().base_url().to_string()),
            Cell::from(remote.source().version().to_string()),
            Cell::from(if enabled { "[x]" } else { "[ ]" }).style(Style::default().fg(
                if enabled { Color::Green } else { Color::DarkGray },
            )),
            health_cell(cache.source_health(remote.name())),
            Cell::from(snapshots.len().to_string()),
            Cell::from(last_update),
        ]);
        if Some(index) == selected {
            row.style(selected_style())
        } else {
            row
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Min(24),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(26),
            Constraint::Length(7),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(" SOURCES ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn render_refresh(f: &mut Frame, app: &App, area: Rect) {
    let config = app.scheduler.config();
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));

    let lines = vec![
        Line::from(vec![
            label("Fast: "),
            Span::raw(format!("{:?}", config.fast)),
            label("  Medium: "),
            Span::raw(format!("{:?}", config.medium)),
            label("  Slow: "),
            Span::raw(format!("{:?}", config.slow)),
        ]),
        Line::from(vec![
            label("Fetch pool: "),
            Span::raw(config.pool_size.to_string()),
            label("  Standing categories: "),
            Span::raw(config.standing.len().to_string()),
        ]),
        Line::from(vec![
            label("Chart bars: "),
            Span::raw(app.display.chart_bars.to_string()),
            label("  Log lines: "),
            Span::raw(app.display.log_limit.to_string()),
            label("  System info: "),
            Span::raw(if app.display.show_sysinfo { "on" } else { "off" }),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" REFRESH ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(paragraph, area);
}
