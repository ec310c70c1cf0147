use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, time::Duration};

/// Refresh interval class assigned to every [`DataCategory`].
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Deserialize,
    Serialize,
    derive_more::Display,
)]
pub enum Cadence {
    #[display("fast")]
    Fast,
    #[display("medium")]
    Medium,
    #[display("slow")]
    Slow,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::Fast, Cadence::Medium, Cadence::Slow];

    pub fn default_period(&self) -> Duration {
        match self {
            Cadence::Fast => Duration::from_secs(1),
            Cadence::Medium => Duration::from_secs(5),
            Cadence::Slow => Duration::from_secs(60),
        }
    }
}

/// Parameters identifying one candle series request.
///
/// The `limit` is part of the key, so a full-window fetch and a tail fetch for the same
/// pair live in different cache slots.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Constructor,
)]
pub struct CandleKey {
    pub pair: SmolStr,
    pub timeframe: SmolStr,
    pub limit: u32,
}

impl CandleKey {
    /// Same pair and timeframe, different window.
    pub fn with_limit(&self, limit: u32) -> Self {
        Self {
            limit,
            ..self.clone()
        }
    }

    pub fn same_series(&self, other: &CandleKey) -> bool {
        self.pair == other.pair && self.timeframe == other.timeframe
    }
}

/// Every kind of data fetched from a remote bot.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum DataCategory {
    OpenTrades,
    ClosedTrades,
    TagSummary,
    Performance,
    DailyProfit(u32),
    WeeklyProfit(u32),
    MonthlyProfit(u32),
    Logs(u32),
    SysInfo,
    Candles(CandleKey),
    ProfitSummary,
    Whitelist,
    TradeCount,
}

impl DataCategory {
    pub fn cadence(&self) -> Cadence {
        match self {
            DataCategory::OpenTrades | DataCategory::ProfitSummary | DataCategory::TradeCount => {
                Cadence::Fast
            }
            DataCategory::ClosedTrades
            | DataCategory::TagSummary
            | DataCategory::Performance
            | DataCategory::DailyProfit(_)
            | DataCategory::WeeklyProfit(_)
            | DataCategory::MonthlyProfit(_)
            | DataCategory::Logs(_)
            | DataCategory::SysInfo => Cadence::Medium,
            DataCategory::Candles(_) | DataCategory::Whitelist => Cadence::Slow,
        }
    }

    /// Categories refreshed for every enabled source regardless of which views are visible.
    pub fn standing(log_limit: u32, show_sysinfo: bool) -> Vec<DataCategory> {
        let mut categories = vec![
            DataCategory::OpenTrades,
            DataCategory::ProfitSummary,
            DataCategory::TradeCount,
            DataCategory::ClosedTrades,
            DataCategory::TagSummary,
            DataCategory::Performance,
            DataCategory::DailyProfit(2),
            DataCategory::WeeklyProfit(2),
            DataCategory::MonthlyProfit(2),
            DataCategory::Logs(log_limit),
            DataCategory::Whitelist,
        ];
        if show_sysinfo {
            categories.push(DataCategory::SysInfo);
        }
        categories
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataCategory::OpenTrades => write!(f, "open_trades"),
            DataCategory::ClosedTrades => write!(f, "closed_trades"),
            DataCategory::TagSummary => write!(f, "tag_summary"),
            DataCategory::Performance => write!(f, "performance"),
            DataCategory::DailyProfit(days) => write!(f, "daily_profit({days})"),
            DataCategory::WeeklyProfit(weeks) => write!(f, "weekly_profit({weeks})"),
            DataCategory::MonthlyProfit(months) => write!(f, "monthly_profit({months})"),
            DataCategory::Logs(limit) => write!(f, "logs({limit})"),
            DataCategory::SysInfo => write!(f, "sysinfo"),
            DataCategory::Candles(key) => {
                write!(f, "candles({}, {}, {})", key.pair, key.timeframe, key.limit)
            }
            DataCategory::ProfitSummary => write!(f, "profit_summary"),
            DataCategory::Whitelist => write!(f, "whitelist"),
            DataCategory::TradeCount => write!(f, "trade_count"),
        }
    }
}
