//! Rendering of every screen. Render functions only read the [`App`] and the snapshot cache.

use crate::app::{App, Screen, TradeLookup};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
};

mod bot;
mod dashboard;
mod settings;
mod widgets;

pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_screens(f, app, chunks[0]);
    match app.screen {
        Screen::Dashboard => dashboard::render(f, app, chunks[1]),
        Screen::Bot => bot::render(f, app, chunks[1]),
        Screen::Settings => settings::render(f, app, chunks[1]),
    }
    render_help(f, app, chunks[2]);

    if let Some(lookup) = &app.trade_info {
        render_trade_info(f, lookup);
    } else if app.show_help {
        render_help_overlay(f);
    }
}

fn render_screens(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line<'_>> = Screen::ALL
        .iter()
        .map(|screen| Line::from(screen.title()))
        .collect();
    let selected = Screen::ALL
        .iter()
        .position(|screen| *screen == app.screen)
        .unwrap_or_default();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" FTUI ")
                .border_style(Style::default().fg(Color::White)),
        )
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn render_help(f: &mut Frame, app: &App, area: Rect) {
    let keys = match app.screen {
        Screen::Dashboard => "q quit | h help | ←/→ chart bot | ↑/↓ select | enter trade | r refresh",
        Screen::Bot => "q quit | h help | tab/shift-tab view | ←/→ bot | ↑/↓ select | enter trade | r refresh chart",
        Screen::Settings => "q quit | h help | ↑/↓ select | space toggle source",
    };
    let help = Paragraph::new(Line::from(Span::styled(
        keys,
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(help, area);
}

const HELP_KEYS: &[(&str, &str)] = &[
    ("d / b / s", "dashboard, bot view, settings"),
    ("tab / shift-tab", "next or previous bot view tab"),
    ("← / →", "cycle bot, or the dashboard chart filter"),
    ("↑ / ↓", "move the table selection"),
    ("enter", "trade details for the selected row"),
    ("space", "enable or disable the selected source in settings"),
    ("r", "refresh the visible screen now"),
    ("h", "toggle this help"),
    ("q / esc", "close a popup, otherwise quit"),
];

fn render_help_overlay(f: &mut Frame) {
    let area = widgets::centered_rect(60, 50, f.area());
    let block = Block::default()
        .title(" HELP ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let mut lines = vec![
        Line::from(Span::styled(
            "Terminal dashboard for freqtrade bots",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(HELP_KEYS.iter().map(|(keys, action)| {
        Line::from(vec![
            Span::styled(format!("{keys:<16}"), Style::default().fg(Color::Yellow)),
            Span::raw(*action),
        ])
    }));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_trade_info(f: &mut Frame, lookup: &TradeLookup) {
    let area = widgets::centered_rect(60, 60, f.area());
    let block = Block::default()
        .title(format!(" {} trade {} ", lookup.source, lookup.trade_id))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));
    let lines = match &lookup.result {
        Ok(trade) => {
            let mut lines = vec![
                Line::from(vec![
                    label("Pair: "),
                    Span::styled(
                        trade.pair.to_string(),
                        Style::default()
                            .fg(Color::White)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(if trade.is_short { "  short" } else { "  long" }),
                    Span::raw(if trade.is_open { "  open" } else { "  closed" }),
                ]),
                Line::from(vec![
                    label("Open rate: "),
                    Span::raw(format!("{:.8}", trade.open_rate)),
                    label("  Close rate: "),
                    Span::raw(widgets::format_opt(trade.close_rate, "")),
                ]),
                Line::from(vec![
                    label("Profit: "),
                    Span::styled(
                        widgets::format_opt(trade.profit_abs, ""),
                        widgets::profit_style(trade.profit_abs.unwrap_or_default()),
                    ),
                    label("  "),
                    Span::styled(
                        widgets::format_opt(trade.profit_pct, "%"),
                        widgets::profit_style(trade.profit_pct.unwrap_or_default()),
                    ),
                ]),
                Line::from(vec![
                    label("Stake: "),
                    Span::raw(format!("{:.2}", trade.stake_amount)),
                    label("  Leverage: "),
                    Span::raw(widgets::format_opt(trade.leverage, "x")),
                ]),
                Line::from(vec![
                    label("Opened: "),
                    Span::raw(trade.open_date.clone().unwrap_or_default()),
                    label("  Closed: "),
                    Span::raw(trade.close_date.clone().unwrap_or_default()),
                ]),
                Line::from(vec![
                    label("Enter tag: "),
                    Span::raw(trade.enter_tag.as_deref().unwrap_or("-").to_string()),
                    label("  Exit reason: "),
                    Span::raw(trade.exit_reason.as_deref().unwrap_or("-").to_string()),
                ]),
                Line::from(""),
                Line::from(Span::styled(
                    "Orders",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )),
            ];
            lines.extend(trade.orders.iter().map(|order| {
                Line::from(format!(
                    "{:<5} {:<8} {:<8} amount {} @ {} {}",
                    order.ft_order_side.as_deref().unwrap_or("-"),
                    order.order_type.as_deref().unwrap_or("-"),
                    order.status.as_deref().unwrap_or("-"),
                    widgets::format_opt(order.amount, ""),
                    widgets::format_opt(order.safe_price, ""),
                    order.order_date.as_deref().unwrap_or_default(),
                ))
            }));
            lines
        }
        Err(error) => vec![Line::from(Span::styled(
            format!("Lookup failed: {error}"),
            Style::default().fg(Color::Red),
        ))],
    };

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}
