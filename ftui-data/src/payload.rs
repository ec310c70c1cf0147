use crate::model::{
    Candle, ClosedTrade, LogLine, OpenTrade, PairPerformance, PeriodProfit, ProfitSummary,
    SysInfo, TagSummary, TradeCount,
};
use smol_str::SmolStr;
use std::sync::Arc;

/// Normalized rows for one [`DataCategory`](crate::category::DataCategory).
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Payload {
    OpenTrades(Vec<OpenTrade>),
    ClosedTrades(Arc<Vec<ClosedTrade>>),
    TagSummary(Vec<TagSummary>),
    Performance(Vec<PairPerformance>),
    PeriodProfit(Vec<PeriodProfit>),
    Logs(Vec<LogLine>),
    SysInfo(SysInfo),
    Candles(Vec<Candle>),
    ProfitSummary(ProfitSummary),
    Whitelist(Vec<SmolStr>),
    TradeCount(TradeCount),
}

impl Payload {
    /// Number of rows. Single-record payloads count as one row.
    pub fn len(&self) -> usize {
        match self {
            Payload::OpenTrades(rows) => rows.len(),
            Payload::ClosedTrades(rows) => rows.len(),
            Payload::TagSummary(rows) => rows.len(),
            Payload::Performance(rows) => rows.len(),
            Payload::PeriodProfit(rows) => rows.len(),
            Payload::Logs(rows) => rows.len(),
            Payload::Candles(rows) => rows.len(),
            Payload::Whitelist(rows) => rows.len(),
            Payload::SysInfo(_) | Payload::ProfitSummary(_) | Payload::TradeCount(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_trades(&self) -> Option<&[OpenTrade]> {
        match self {
            Payload::OpenTrades(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn closed_trades(&self) -> Option<&Arc<Vec<ClosedTrade>>> {
        match self {
            Payload::ClosedTrades(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn tag_summary(&self) -> Option<&[TagSummary]> {
        match self {
            Payload::TagSummary(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn performance(&self) -> Option<&[PairPerformance]> {
        match self {
            Payload::Performance(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn period_profit(&self) -> Option<&[PeriodProfit]> {
        match self {
            Payload::PeriodProfit(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn logs(&self) -> Option<&[LogLine]> {
        match self {
            Payload::Logs(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn sys_info(&self) -> Option<&SysInfo> {
        match self {
            Payload::SysInfo(info) => Some(info),
            _ => None,
        }
    }

    pub fn candles(&self) -> Option<&[Candle]> {
        match self {
            Payload::Candles(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn profit_summary(&self) -> Option<&ProfitSummary> {
        match self {
            Payload::ProfitSummary(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn whitelist(&self) -> Option<&[SmolStr]> {
        match self {
            Payload::Whitelist(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn trade_count(&self) -> Option<&TradeCount> {
        match self {
            Payload::TradeCount(count) => Some(count),
            _ => None,
        }
    }
}
