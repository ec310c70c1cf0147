use crate::{
    error::FetchError,
    model::{
        candle::PairCandlesResponse,
        profit::{PairPerformance, ProfitSummary, TimescaleResponse},
        system::{BotConfig, LogsResponse, SysInfo, TradeCount, VersionResponse, WhitelistResponse},
        trade::{Trade, TradesPage},
    },
};
use async_trait::async_trait;

/// Typed access to the freqtrade REST API of one bot.
///
/// Implementations perform no caching. [`RestClient`](super::rest::RestClient) is the
/// production implementation.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn version(&self) -> Result<VersionResponse, FetchError>;

    async fn show_config(&self) -> Result<BotConfig, FetchError>;

    /// Currently open trades.
    async fn status(&self) -> Result<Vec<Trade>, FetchError>;

    /// One page of closed trade history, oldest first within the page.
    async fn trades(&self, offset: u64, limit: u32) -> Result<TradesPage, FetchError>;

    async fn trade(&self, trade_id: u64) -> Result<Trade, FetchError>;

    async fn profit(&self) -> Result<ProfitSummary, FetchError>;

    async fn daily(&self, days: u32) -> Result<TimescaleResponse, FetchError>;

    async fn weekly(&self, weeks: u32) -> Result<TimescaleResponse, FetchError>;

    async fn monthly(&self, months: u32) -> Result<TimescaleResponse, FetchError>;

    async fn performance(&self) -> Result<Vec<PairPerformance>, FetchError>;

    async fn pair_candles(
        &self,
        pair: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<PairCandlesResponse, FetchError>;

    async fn logs(&self, limit: u32) -> Result<LogsResponse, FetchError>;

    async fn sysinfo(&self) -> Result<SysInfo, FetchError>;

    async fn whitelist(&self) -> Result<WhitelistResponse, FetchError>;

    async fn count(&self) -> Result<TradeCount, FetchError>;
}
