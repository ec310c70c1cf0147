use crate::error::FetchError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use smol_str::SmolStr;

/// Date format used by freqtrade for `open_date` / `close_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Trade record as returned by `/status`, `/trades` and `/trade/{id}`.
///
/// Only the fields the dashboard consumes are modelled; everything else is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub pair: SmolStr,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_short: bool,
    pub open_rate: f64,
    #[serde(default)]
    pub close_rate: Option<f64>,
    #[serde(default)]
    pub current_rate: Option<f64>,
    #[serde(default)]
    pub max_rate: Option<f64>,
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    #[serde(default)]
    pub profit_pct: Option<f64>,
    #[serde(default)]
    pub profit_abs: Option<f64>,
    #[serde(default)]
    pub open_date: Option<String>,
    #[serde(default)]
    pub open_timestamp: Option<i64>,
    #[serde(default)]
    pub close_date: Option<String>,
    #[serde(default)]
    pub close_timestamp: Option<i64>,
    #[serde(default)]
    pub enter_tag: Option<SmolStr>,
    #[serde(default)]
    pub exit_reason: Option<SmolStr>,
    #[serde(default)]
    pub stake_amount: f64,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default)]
    pub has_open_orders: Option<bool>,
    #[serde(default)]
    pub open_order_id: Option<String>,
    #[serde(default)]
    pub close_rate_requested: Option<f64>,
    #[serde(default)]
    pub orders: Vec<TradeOrder>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeOrder {
    #[serde(default)]
    pub ft_order_side: Option<SmolStr>,
    #[serde(default)]
    pub order_type: Option<SmolStr>,
    #[serde(default)]
    pub status: Option<SmolStr>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub safe_price: Option<f64>,
    #[serde(default)]
    pub order_date: Option<String>,
}

/// Page returned by `/trades?offset=&limit=`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradesPage {
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub trades_count: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub total_trades: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, derive_more::Display)]
pub enum Side {
    #[display("L")]
    Long,
    #[display("S")]
    Short,
}

impl Side {
    fn from_is_short(is_short: bool) -> Self {
        if is_short { Side::Short } else { Side::Long }
    }
}

/// Normalized open trade row.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrade {
    pub trade_id: u64,
    pub pair: SmolStr,
    /// Pair with ` *` for pending orders or ` **` once an exit has been requested.
    pub display_pair: String,
    pub side: Side,
    pub open_rate: f64,
    pub current_rate: Option<f64>,
    pub stop_loss_pct: Option<f64>,
    pub max_pct: f64,
    pub profit_pct: f64,
    pub profit_abs: f64,
    pub open_date: DateTime<Utc>,
    pub enter_tag: Option<SmolStr>,
    pub stake_amount: f64,
    pub leverage: f64,
    pub order_count: usize,
}

impl OpenTrade {
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.open_date
    }
}

impl TryFrom<Trade> for OpenTrade {
    type Error = FetchError;

    fn try_from(trade: Trade) -> Result<Self, Self::Error> {
        let open_date = parse_trade_time(
            trade.open_timestamp,
            trade.open_date.as_deref(),
            "open_date",
        )?;

        let has_open_orders = trade
            .has_open_orders
            .unwrap_or(trade.open_order_id.is_some());
        let suffix = match (trade.close_rate_requested, has_open_orders) {
            (Some(_), _) => " **",
            (None, true) => " *",
            (None, false) => "",
        };

        let max_pct = match trade.max_rate {
            Some(max_rate) if max_rate != 0.0 => {
                round2((max_rate - trade.open_rate) / max_rate * 100.0)
            }
            _ => 0.0,
        };

        Ok(Self {
            trade_id: trade.trade_id,
            display_pair: format!("{}{}", trade.pair, suffix),
            pair: trade.pair,
            side: Side::from_is_short(trade.is_short),
            open_rate: trade.open_rate,
            current_rate: trade.current_rate,
            stop_loss_pct: trade.stop_loss_pct,
            max_pct,
            profit_pct: trade.profit_pct.unwrap_or_default(),
            profit_abs: round2(trade.profit_abs.unwrap_or_default()),
            open_date,
            enter_tag: trade.enter_tag,
            stake_amount: trade.stake_amount,
            leverage: trade.leverage.unwrap_or(1.0),
            order_count: trade.orders.len(),
        })
    }
}

/// Normalized closed trade row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub trade_id: u64,
    pub pair: SmolStr,
    pub side: Side,
    pub profit_pct: f64,
    pub profit_abs: f64,
    pub open_date: DateTime<Utc>,
    pub close_date: DateTime<Utc>,
    pub enter_tag: Option<SmolStr>,
    pub exit_reason: Option<SmolStr>,
    pub open_rate: f64,
    pub close_rate: Option<f64>,
    pub stake_amount: f64,
    pub leverage: f64,
}

impl ClosedTrade {
    pub fn duration(&self) -> Duration {
        self.close_date - self.open_date
    }
}

impl TryFrom<Trade> for ClosedTrade {
    type Error = FetchError;

    fn try_from(trade: Trade) -> Result<Self, Self::Error> {
        let open_date = parse_trade_time(
            trade.open_timestamp,
            trade.open_date.as_deref(),
            "open_date",
        )?;
        let close_date = parse_trade_time(
            trade.close_timestamp,
            trade.close_date.as_deref(),
            "close_date",
        )?;

        Ok(Self {
            trade_id: trade.trade_id,
            pair: trade.pair,
            side: Side::from_is_short(trade.is_short),
            profit_pct: trade.profit_pct.unwrap_or_default(),
            profit_abs: trade.profit_abs.unwrap_or_default(),
            open_date,
            close_date,
            enter_tag: trade.enter_tag,
            exit_reason: trade.exit_reason,
            open_rate: trade.open_rate,
            close_rate: trade.close_rate,
            stake_amount: trade.stake_amount,
            leverage: trade.leverage.unwrap_or(1.0),
        })
    }
}

/// Per enter_tag breakdown of closed trades.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSummary {
    pub tag: SmolStr,
    pub wins: usize,
    pub losses: usize,
    pub avg_duration: Duration,
    pub avg_win_duration: Option<Duration>,
    pub avg_loss_duration: Option<Duration>,
    pub profit_abs: f64,
}

/// Group closed trades by enter_tag, preserving first-seen order.
///
/// A trade with `profit_abs > 0` counts as a win; everything else is a loss.
pub fn tag_summary(trades: &[ClosedTrade]) -> Vec<TagSummary> {
    let mut by_tag: IndexMap<SmolStr, Vec<&ClosedTrade>> = IndexMap::new();
    for trade in trades {
        let tag = trade.enter_tag.clone().unwrap_or_default();
        by_tag.entry(tag).or_default().push(trade);
    }

    by_tag
        .into_iter()
        .map(|(tag, trades)| {
            let (winners, losers): (Vec<&ClosedTrade>, Vec<&ClosedTrade>) =
                trades.iter().partition(|trade| trade.profit_abs > 0.0);

            TagSummary {
                tag,
                wins: winners.len(),
                losses: losers.len(),
                avg_duration: mean_duration(&trades).unwrap_or_else(Duration::zero),
                avg_win_duration: mean_duration(&winners),
                avg_loss_duration: mean_duration(&losers),
                profit_abs: round2(trades.iter().map(|trade| trade.profit_abs).sum()),
            }
        })
        .collect()
}

fn mean_duration(trades: &[&ClosedTrade]) -> Option<Duration> {
    if trades.is_empty() {
        return None;
    }
    let total_secs: i64 = trades
        .iter()
        .map(|trade| trade.duration().num_seconds())
        .sum();
    let mean = (total_secs as f64 / trades.len() as f64).round() as i64;
    Some(Duration::seconds(mean))
}

/// Resolve a trade timestamp, preferring the millisecond field over the formatted date.
pub fn parse_trade_time(
    timestamp_ms: Option<i64>,
    date: Option<&str>,
    field: &str,
) -> Result<DateTime<Utc>, FetchError> {
    if let Some(time) = timestamp_ms.and_then(DateTime::from_timestamp_millis) {
        return Ok(time);
    }

    let date = date.ok_or_else(|| FetchError::malformed("trade", format!("missing {field}")))?;
    NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|error| FetchError::malformed("trade", format!("invalid {field} {date:?}: {error}")))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
