use crate::{
    app::App,
    ui::widgets::{
        clamp_selection, format_duration, format_opt, header_row, panel_block, placeholder,
        profit_cell, profit_style, selected_style,
    },
};
use chrono::Utc;
use ftui_data::{
    DataCategory, RemoteSource,
    view::{BotTab, ChartView, PanelState},
};
use itertools::Itertools;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Tabs, Wrap,
    },
};

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let Some(remote) = app.current_source() else {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "No bots registered",
            Style::default().fg(Color::DarkGray),
        )))
        .block(
            Block::default()
                .title(" BOT ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        );
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Percentage(55),
            Constraint::Min(0),
        ])
        .split(area);

    render_header(f, app, remote, chunks[0]);
    render_tabs(f, app, chunks[1]);
    match app.bot.tab {
        BotTab::OpenTrades => render_open_trades(f, app, remote, chunks[2]),
        BotTab::ClosedTrades => render_closed_trades(f, app, remote, chunks[2]),
        BotTab::TagSummary => render_tag_summary(f, app, remote, chunks[2]),
        BotTab::Performance => render_performance(f, app, remote, chunks[2]),
        BotTab::Logs => render_logs(f, app, remote, chunks[2]),
        BotTab::System => render_system(f, app, remote, chunks[2]),
        BotTab::Whitelist => render_whitelist(f, app, remote, chunks[2]),
    }
    match &app.bot.chart {
        Some(chart) => render_chart(f, app, chart, chunks[3]),
        None => {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                "Waiting for candle data...",
                Style::default().fg(Color::DarkGray),
            )))
            .block(
                Block::default()
                    .title(" CHART ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::White)),
            );
            f.render_widget(paragraph, chunks[3]);
        }
    }
}

fn render_header(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let source = remote.source();
    let config = source.config();
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &DataCategory::ProfitSummary);
    let block = panel_block(
        &format!(
            "{} ({}/{})",
            remote.name(),
            app.bot.source_index + 1,
            app.scheduler.sources().len()
        ),
        &state,
    );

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));
    let text = |value: Option<&str>| Span::raw(value.unwrap_or("-").to_string());

    let mut status = vec![
        label("State: "),
        text(config.state.as_deref()),
        label("  Strategy: "),
        text(config.strategy.as_deref()),
        label("  Exchange: "),
        text(config.exchange.as_deref()),
        label("  Timeframe: "),
        Span::raw(config.timeframe.to_string()),
        label("  Version: "),
        Span::raw(source.version().to_string()),
    ];
    if config.dry_run {
        status.push(Span::styled(
            "  DRY RUN",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if !source.is_enabled() {
        status.push(Span::styled(
            "  DISABLED",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let profit = match state.payload().and_then(|payload| payload.profit_summary()) {
        Some(summary) => Line::from(vec![
            label("Closed profit: "),
            Span::styled(
                format!("{:.2} {}", summary.profit_closed_coin, config.stake_currency),
                profit_style(summary.profit_closed_coin),
            ),
            label("  All: "),
            Span::styled(
                format!("{:.2} {}", summary.profit_all_coin, config.stake_currency),
                profit_style(summary.profit_all_coin),
            ),
            label("  Trades: "),
            Span::raw(format!(
                "{} open / {} closed ({}W {}L)",
                summary.open_trade_count(),
                summary.closed_trade_count,
                summary.winning_trades,
                summary.losing_trades
            )),
            label("  PF: "),
            Span::raw(format_opt(summary.profit_factor, "")),
            label("  Max DD: "),
            Span::raw(format_opt(summary.max_drawdown.map(|dd| dd * 100.0), "%")),
        ]),
        None => Line::from(Span::styled(
            "Waiting for profit data...",
            Style::default().fg(Color::DarkGray),
        )),
    };

    f.render_widget(
        Paragraph::new(vec![Line::from(status), profit]).block(block),
        area,
    );
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line<'_>> = BotTab::ALL
        .iter()
        .map(|tab| Line::from(tab.to_string()))
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" Views "))
        .select(app.bot.tab.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn render_open_trades(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let cache = app.scheduler.cache();
    let state = PanelState::read(cache, remote.name(), &DataCategory::OpenTrades);
    let slots = PanelState::read(cache, remote.name(), &DataCategory::TradeCount);
    let title = match slots.payload().and_then(|payload| payload.trade_count()) {
        Some(count) => format!(
            "OPEN TRADES {}/{} (stake {:.2})",
            count.current, count.max, count.total_stake
        ),
        None => "OPEN TRADES".to_string(),
    };
    let block = panel_block(&title, &state);

    let trades = match state.payload().and_then(|payload| payload.open_trades()) {
        Some(trades) if !trades.is_empty() => trades,
        _ => {
            f.render_widget(placeholder("open trade", &state, block), area);
            return;
        }
    };

    let now = Utc::now();
    let selected = clamp_selection(app.bot.selected, trades.len());
    let header = header_row(&[
        "ID", "Pair", "Side", "Stake", "Lev.", "Open rate", "Current", "Stop %", "Profit %",
        "Profit", "Max %", "Orders", "Duration", "Tag",
    ]);
    let rows = trades.iter().enumerate().map(|(index, trade)| {
        let row = Row::new(vec![
            Cell::from(trade.trade_id.to_string()),
            Cell::from(trade.display_pair.clone()),
            Cell::from(trade.side.to_string()),
            Cell::from(format!("{:.2}", trade.stake_amount)),
            Cell::from(format!("{:.1}x", trade.leverage)),
            Cell::from(format!("{:.6}", trade.open_rate)),
            Cell::from(
                trade
                    .current_rate
                    .map(|rate| format!("{rate:.6}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::from(format_opt(trade.stop_loss_pct, "%")),
            profit_cell(trade.profit_pct, "%"),
            profit_cell(trade.profit_abs, ""),
            Cell::from(format!("{:.2}%", trade.max_pct)),
            Cell::from(trade.order_count.to_string()),
            Cell::from(format_duration(trade.duration(now))),
            Cell::from(trade.enter_tag.as_deref().unwrap_or_default().to_string()),
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
            Constraint::Length(6),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn render_closed_trades(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &DataCategory::ClosedTrades);

    let trades = match state.payload().and_then(|payload| payload.closed_trades()) {
        Some(trades) if !trades.is_empty() => trades,
        _ => {
            let block = panel_block("CLOSED TRADES", &state);
            f.render_widget(placeholder("closed trade", &state, block), area);
            return;
        }
    };
    let block = panel_block(&format!("CLOSED TRADES ({})", trades.len()), &state);

    // Keep the cursor in view
    let visible = area.height.saturating_sub(3) as usize;
    let selected = clamp_selection(app.bot.selected, trades.len());
    let skip = selected
        .map(|index| (index + 1).saturating_sub(visible))
        .unwrap_or_default();

    let header = header_row(&[
        "ID", "Pair", "Side", "Profit %", "Profit", "Open rate", "Close rate", "Opened", "Closed",
        "Duration", "Tag", "Exit",
    ]);
    let rows = trades
        .iter()
        .enumerate()
        .skip(skip)
        .take(visible.max(1))
        .map(|(index, trade)| {
            let row = Row::new(vec![
                Cell::from(trade.trade_id.to_string()),
                Cell::from(trade.pair.to_string()),
                Cell::from(trade.side.to_string()),
                profit_cell(trade.profit_pct, "%"),
                profit_cell(trade.profit_abs, ""),
                Cell::from(format!("{:.6}", trade.open_rate)),
                Cell::from(
                    trade
                        .close_rate
                        .map(|rate| format!("{rate:.6}"))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(trade.open_date.format("%m-%d %H:%M").to_string()),
                Cell::from(trade.close_date.format("%m-%d %H:%M").to_string()),
                Cell::from(format_duration(trade.duration())),
                Cell::from(trade.enter_tag.as_deref().unwrap_or_default().to_string()),
                Cell::from(trade.exit_reason.as_deref().unwrap_or_default().to_string()),
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
            Constraint::Length(6),
            Constraint::Length(14),
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn render_tag_summary(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &DataCategory::TagSummary);
    let block = panel_block("TAG SUMMARY", &state);

    let tags = match state.payload().and_then(|payload| payload.tag_summary()) {
        Some(tags) if !tags.is_empty() => tags,
        _ => {
            f.render_widget(placeholder("tag summary", &state, block), area);
            return;
        }
    };

    let duration = |value: Option<chrono::Duration>| {
        value.map(format_duration).unwrap_or_else(|| "-".to_string())
    };
    let header = header_row(&[
        "Tag", "Wins", "Losses", "Winrate", "Avg dur.", "Win dur.", "Loss dur.", "Profit",
    ]);
    let rows = tags.iter().map(|tag| {
        let decided = tag.wins + tag.losses;
        let winrate = if decided == 0 {
            0.0
        } else {
            tag.wins as f64 / decided as f64 * 100.0
        };
        Row::new(vec![
            Cell::from(tag.tag.to_string()),
            Cell::from(tag.wins.to_string()),
            Cell::from(tag.losses.to_string()),
            Cell::from(format!("{winrate:.1}%")),
            Cell::from(format_duration(tag.avg_duration)),
            Cell::from(duration(tag.avg_win_duration)),
            Cell::from(duration(tag.avg_loss_duration)),
            profit_cell(tag.profit_abs, ""),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn render_performance(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &DataCategory::Performance);
    let block = panel_block("PERFORMANCE", &state);

    let pairs = match state.payload().and_then(|payload| payload.performance()) {
        Some(pairs) if !pairs.is_empty() => pairs,
        _ => {
            f.render_widget(placeholder("performance", &state, block), area);
            return;
        }
    };

    let header = header_row(&["Pair", "Trades", "Profit %", "Profit"]);
    let rows = pairs.iter().map(|pair| {
        Row::new(vec![
            Cell::from(pair.pair.to_string()),
            Cell::from(pair.count.to_string()),
            Cell::from(format_opt(pair.profit_pct, "%"))
                .style(profit_style(pair.profit_pct.unwrap_or_default())),
            profit_cell(pair.profit_abs, ""),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn level_style(level: &str) -> Style {
    match level {
        "ERROR" | "CRITICAL" => Style::default().fg(Color::Red),
        "WARNING" => Style::default().fg(Color::Yellow),
        "DEBUG" => Style::default().fg(Color::DarkGray),
        _ => Style::default().fg(Color::Gray),
    }
}

fn render_logs(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let category = DataCategory::Logs(app.display.log_limit);
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &category);
    let block = panel_block("LOGS", &state);

    let logs = match state.payload().and_then(|payload| payload.logs()) {
        Some(logs) if !logs.is_empty() => logs,
        _ => {
            f.render_widget(placeholder("log", &state, block), area);
            return;
        }
    };

    // Newest last, scrolled so the tail is visible
    let lines: Vec<Line<'_>> = logs
        .iter()
        .map(|log| Line::from(Span::styled(log.to_string(), level_style(&log.level))))
        .collect();
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    f.render_widget(Paragraph::new(lines).block(block).scroll((scroll, 0)), area);
}

fn render_system(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &DataCategory::SysInfo);
    let block = panel_block("SYSTEM", &state);
    let config = remote.source().config();

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));
    let value = |text: Option<&str>| Span::raw(text.unwrap_or("-").to_string());

    let mut lines = vec![
        Line::from(vec![label("URL: "), Span::raw(remote.source().base_url().to_string())]),
        Line::from(vec![label("Bot name: "), value(config.bot_name.as_deref())]),
        Line::from(vec![
            label("Run mode: "),
            value(config.runmode.as_deref()),
            label("  Trading mode: "),
            value(config.trading_mode.as_deref()),
        ]),
        Line::from(vec![
            label("Stake: "),
            Span::raw(
                config
                    .stake_amount
                    .as_ref()
                    .map(|stake| format!("{stake} {}", config.stake_currency))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            label("  Max open trades: "),
            Span::raw(format_opt(config.max_open_trades, "")),
        ]),
        Line::from(""),
    ];

    if app.display.show_sysinfo {
        match state.payload().and_then(|payload| payload.sys_info()) {
            Some(info) => {
                lines.push(Line::from(vec![
                    label("CPU: "),
                    Span::raw(format_opt(info.cpu_mean(), "%")),
                    label("  per core: "),
                    Span::raw(info.cpu_pct.iter().map(|cpu| format!("{cpu:.0}")).join(" ")),
                ]));
                lines.push(Line::from(vec![
                    label("RAM: "),
                    Span::raw(format!("{:.1}%", info.ram_pct)),
                ]));
            }
            None if state.is_loading() => lines.push(Line::from(Span::styled(
                "Waiting for system data...",
                Style::default().fg(Color::DarkGray),
            ))),
            None => lines.push(Line::from(Span::styled(
                "System information unavailable",
                Style::default().fg(Color::DarkGray),
            ))),
        }
    }

    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn render_whitelist(f: &mut Frame, app: &App, remote: &RemoteSource, area: Rect) {
    let state = PanelState::read(app.scheduler.cache(), remote.name(), &DataCategory::Whitelist);

    let pairs = match state.payload().and_then(|payload| payload.whitelist()) {
        Some(pairs) if !pairs.is_empty() => pairs,
        _ => {
            let block = panel_block("WHITELIST", &state);
            f.render_widget(placeholder("whitelist", &state, block), area);
            return;
        }
    };
    let block = panel_block(&format!("WHITELIST ({})", pairs.len()), &state);

    let width = pairs.iter().map(|pair| pair.len()).max().unwrap_or(1) + 2;
    let columns = (area.width.saturating_sub(2) as usize / width).max(1);
    let lines: Vec<Line<'_>> = pairs
        .chunks(columns)
        .map(|row| Line::from(row.iter().map(|pair| format!("{pair:<width$}")).join("")))
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_chart(f: &mut Frame, app: &App, chart: &ChartView, area: Rect) {
    let state = chart.state(&app.scheduler);
    let buffer = chart.buffer();
    let title = format!("{} {} ({} bars)", chart.pair(), chart.timeframe(), buffer.len());
    let block = panel_block(&title, &state);

    let (Some(first), Some(last)) = (buffer.bars().next(), buffer.bars().next_back()) else {
        f.render_widget(placeholder("candle", &state, block), area);
        return;
    };

    let close: Vec<(f64, f64)> = buffer
        .bars()
        .enumerate()
        .map(|(index, bar)| (index as f64, bar.close))
        .collect();
    let high: Vec<(f64, f64)> = buffer
        .bars()
        .enumerate()
        .map(|(index, bar)| (index as f64, bar.high))
        .collect();
    let low: Vec<(f64, f64)> = buffer
        .bars()
        .enumerate()
        .map(|(index, bar)| (index as f64, bar.low))
        .collect();

    let min = buffer.bars().map(|bar| bar.low).fold(f64::INFINITY, f64::min);
    let max = buffer.bars().map(|bar| bar.high).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((max - min) * 0.05).max(f64::EPSILON);

    let datasets = vec![
        Dataset::default()
            .name("high")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&high),
        Dataset::default()
            .name("low")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&low),
        Dataset::default()
            .name(format!("close {:.6}", last.close))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(if last.close >= first.open {
                Color::Green
            } else {
                Color::Red
            }))
            .data(&close),
    ];

    let widget = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels([
                    Span::raw(first.time.format("%m-%d %H:%M").to_string()),
                    Span::raw(last.time.format("%m-%d %H:%M").to_string()),
                ])
                .bounds([0.0, (close.len().max(2) - 1) as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels([
                    Span::raw(format!("{:.4}", min - pad)),
                    Span::raw(format!("{:.4}", max + pad)),
                ])
                .bounds([min - pad, max + pad]),
        );

    f.render_widget(widget, area);
}
