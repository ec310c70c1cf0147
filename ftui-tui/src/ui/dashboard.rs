use crate::{
    app::App,
    ui::widgets::{
        clamp_selection, format_duration, header_row, profit_cell, profit_style,
        selected_style,
    },
};
use chrono::Utc;
use ftui_data::{
    DataCategory, SourceName,
    view::{DashboardTotals, PanelState, TradeSummary, aggregate::{all_open, cumulative_profit}},
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
};

/// Closed trades listed on the dashboard.
const CLOSED_ROWS: usize = 50;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let names = app.enabled_names();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(names.len() as u16 + 3),
            Constraint::Percentage(35),
            Constraint::Min(0),
        ])
        .split(area);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);

    render_totals(f, app, &names, chunks[0]);
    render_summaries(f, app, &names, chunks[1]);
    render_open_trades(f, app, &names, chunks[2]);
    render_closed_trades(f, app, bottom[0]);
    render_cumulative(f, app, bottom[1]);
}

fn render_totals(f: &mut Frame, app: &App, names: &[SourceName], area: Rect) {
    let block = Block::default()
        .title(" TOTALS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    if names.is_empty() {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "No enabled bots",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let totals = DashboardTotals::fold(app.scheduler.cache(), names);
    let label = |text: String| Span::styled(text, Style::default().fg(Color::Gray));
    let value = |amount: f64| Span::styled(format!("{amount:.2}"), profit_style(amount));
    let pair = |left: &str, current: f64, right: &str, previous: f64| {
        Line::from(vec![
            label(format!("{left:<12}")),
            value(current),
            label(format!("   {right:<12}")),
            value(previous),
        ])
    };

    let lines = vec![
        Line::from(vec![
            label(format!("{:<12}", "Open:")),
            Span::raw(format!("{} trades ", totals.open_trades)),
            value(totals.open_profit),
            label(format!("   {:<12}", "Closed:")),
            Span::raw(format!("{} trades ", totals.closed_trades)),
            value(totals.closed_profit),
        ]),
        pair("Today:", totals.today, "Yesterday:", totals.yesterday),
        pair("This week:", totals.this_week, "Last week:", totals.last_week),
        pair("This month:", totals.this_month, "Last month:", totals.last_month),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn status_cell(state: &PanelState) -> Cell<'static> {
    let (text, color) = match state {
        PanelState::Loading => ("...", Color::DarkGray),
        PanelState::Fresh(_) => ("ok", Color::Green),
        _ if state.is_unauthorized() => ("auth", Color::Red),
        PanelState::Stale(_) => ("stale", Color::Yellow),
        PanelState::Failed(_) => ("down", Color::Red),
    };
    Cell::from(text).style(Style::default().fg(color))
}

fn render_summaries(f: &mut Frame, app: &App, names: &[SourceName], area: Rect) {
    let cache = app.scheduler.cache();
    let header = header_row(&[
        "Bot", "State", "Since", "Open", "Closed", "Open P", "Closed P", "W/L", "Winrate",
        "Exp.", "Exp. R", "Win avg", "Win med", "Loss avg", "Loss med",
    ]);

    let rows = names.iter().map(|name| {
        let summary = TradeSummary::read(cache, name);
        let state = PanelState::read(cache, name, &DataCategory::ProfitSummary);
        let ratio = if summary.expectancy_ratio.is_finite() {
            format!("{:.2}", summary.expectancy_ratio)
        } else {
            "inf".to_string()
        };

        Row::new(vec![
            Cell::from(name.to_string()).style(Style::default().fg(Color::Cyan)),
            status_cell(&state),
            Cell::from(
                summary
                    .bot_start
                    .map(|start| start.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::from(summary.open_count.to_string()),
            Cell::from(summary.closed_count.to_string()),
            profit_cell(summary.open_profit, ""),
            profit_cell(summary.closed_profit, ""),
            Cell::from(format!("{}/{}", summary.wins, summary.losses)),
            Cell::from(format!("{:.1}%", summary.winrate)),
            profit_cell(summary.expectancy, ""),
            Cell::from(ratio),
            profit_cell(summary.mean_win, ""),
            profit_cell(summary.median_win, ""),
            profit_cell(summary.mean_loss, ""),
            profit_cell(summary.median_loss, ""),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(11),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" BOTS ")
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn render_open_trades(f: &mut Frame, app: &App, names: &[SourceName], area: Rect) {
    let trades = all_open(app.scheduler.cache(), names);
    let block = Block::default()
        .title(format!(" OPEN TRADES ({}) ", trades.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    if trades.is_empty() {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "No open trades",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let now = Utc::now();
    let selected = clamp_selection(app.dashboard.selected, trades.len());
    let header = header_row(&[
        "Bot", "ID", "Pair", "Side", "Stake", "Open rate", "Current", "Profit %", "Profit",
        "Max %", "Duration", "Tag",
    ]);
    let rows = trades.iter().enumerate().map(|(index, row)| {
        let trade = &row.trade;
        let cells = Row::new(vec![
            Cell::from(row.source.to_string()).style(Style::default().fg(Color::Cyan)),
            Cell::from(trade.trade_id.to_string()),
            Cell::from(trade.display_pair.clone()),
            Cell::from(trade.side.to_string()),
            Cell::from(format!("{:.2}", trade.stake_amount)),
            Cell::from(format!("{:.6}", trade.open_rate)),
            Cell::from(
                trade
                    .current_rate
                    .map(|rate| format!("{rate:.6}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            profit_cell(trade.profit_pct, "%"),
            profit_cell(trade.profit_abs, ""),
            Cell::from(format!("{:.2}%", trade.max_pct)),
            Cell::from(format_duration(trade.duration(now))),
            Cell::from(trade.enter_tag.as_deref().unwrap_or_default().to_string()),
        ]);
        if Some(index) == selected {
            cells.style(selected_style())
        } else {
            cells
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn render_closed_trades(f: &mut Frame, app: &App, area: Rect) {
    let trades = app.dashboard.all_closed.trades();
    let block = Block::default()
        .title(format!(" CLOSED TRADES ({}) ", trades.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    if trades.is_empty() {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "Waiting for closed trade data...",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let header = header_row(&["Bot", "ID", "Pair", "Profit %", "Profit", "Closed", "Exit"]);
    let rows = trades.iter().take(CLOSED_ROWS).map(|row| {
        let trade = &row.trade;
        Row::new(vec![
            Cell::from(row.source.to_string()).style(Style::default().fg(Color::Cyan)),
            Cell::from(trade.trade_id.to_string()),
            Cell::from(trade.pair.to_string()),
            profit_cell(trade.profit_pct, "%"),
            profit_cell(trade.profit_abs, ""),
            Cell::from(trade.close_date.format("%m-%d %H:%M").to_string()),
            Cell::from(trade.exit_reason.as_deref().unwrap_or_default().to_string()),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn render_cumulative(f: &mut Frame, app: &App, area: Rect) {
    let selected: Vec<SourceName> = app.dashboard.chart_filter.iter().cloned().collect();
    let points = cumulative_profit(app.dashboard.all_closed.trades(), &selected);
    let title = match &app.dashboard.chart_filter {
        Some(name) => format!(" CUMULATIVE PROFIT: {name} "),
        None => " CUMULATIVE PROFIT: all bots ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "Waiting for closed trade data...",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let data: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(index, point)| (index as f64, point.cumulative))
        .collect();
    let (min, max) = data
        .iter()
        .fold((0.0_f64, 0.0_f64), |(min, max), (_, y)| (min.min(*y), max.max(*y)));
    let pad = ((max - min) * 0.05).max(1.0);

    let color = if last.cumulative >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };
    let datasets = vec![
        Dataset::default()
            .name(format!("{:.2}", last.cumulative))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&data),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels([
                    Span::raw(first.date.format("%Y-%m-%d").to_string()),
                    Span::raw(last.date.format("%Y-%m-%d").to_string()),
                ])
                .bounds([0.0, (data.len().max(2) - 1) as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels([
                    Span::raw(format!("{:.0}", min - pad)),
                    Span::raw(format!("{:.0}", max + pad)),
                ])
                .bounds([min - pad, max + pad]),
        );

    f.render_widget(chart, area);
}
