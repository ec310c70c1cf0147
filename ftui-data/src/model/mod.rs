//! Wire types for the freqtrade REST API and the normalized rows stored in snapshots.

/// Candle series from `/pair_candles`.
pub mod candle;

/// Profit summary, period profit and pair performance.
pub mod profit;

/// Bot configuration, logs, sysinfo, whitelist and trade slot counts.
pub mod system;

/// Open and closed trades plus the enter_tag breakdown.
pub mod trade;

pub use candle::Candle;
pub use profit::{PairPerformance, PeriodProfit, ProfitSummary};
pub use system::{BotConfig, LogLine, SysInfo, TradeCount};
pub use trade::{ClosedTrade, OpenTrade, Side, TagSummary, Trade};
