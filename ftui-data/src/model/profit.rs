use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use smol_str::SmolStr;

/// Aggregate profit statistics from `/profit`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfitSummary {
    #[serde(default)]
    pub profit_closed_coin: f64,
    #[serde(default)]
    pub profit_all_coin: f64,
    #[serde(default)]
    pub trade_count: u64,
    pub closed_trade_count: u64,
    #[serde(default)]
    pub winning_trades: u64,
    #[serde(default)]
    pub losing_trades: u64,
    #[serde(default)]
    pub first_trade_timestamp: Option<i64>,
    #[serde(default)]
    pub bot_start_timestamp: Option<i64>,
    #[serde(default)]
    pub profit_factor: Option<f64>,
    #[serde(default)]
    pub max_drawdown: Option<f64>,
}

impl ProfitSummary {
    pub fn open_trade_count(&self) -> u64 {
        self.trade_count.saturating_sub(self.closed_trade_count)
    }

    /// Bot start time, falling back to the first trade when the bot predates the field.
    pub fn bot_start(&self) -> Option<DateTime<Utc>> {
        self.bot_start_timestamp
            .filter(|ts| *ts > 0)
            .or(self.first_trade_timestamp)
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// Response envelope shared by `/daily`, `/weekly` and `/monthly`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimescaleResponse {
    pub data: Vec<PeriodProfit>,
    #[serde(default)]
    pub stake_currency: Option<SmolStr>,
}

/// One period row, newest period first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PeriodProfit {
    pub date: NaiveDate,
    pub abs_profit: f64,
    #[serde(default)]
    pub rel_profit: Option<f64>,
    #[serde(default)]
    pub trade_count: u64,
}

/// Row of `/performance`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairPerformance {
    pub pair: SmolStr,
    pub count: u64,
    #[serde(default)]
    pub profit_pct: Option<f64>,
    #[serde(default)]
    pub profit_abs: f64,
}
