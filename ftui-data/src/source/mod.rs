use self::{
    api::BotApi,
    history::{ClosedTradeHistory, bounded},
};
use crate::{
    category::{CandleKey, DataCategory},
    error::FetchError,
    model::{
        system::BotConfig,
        trade::{OpenTrade, Trade, tag_summary},
    },
    payload::Payload,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use url::Url;

/// [`BotApi`] seam over the freqtrade REST API.
pub mod api;

/// Closed trade pagination and its count-based memo.
pub mod history;

/// Startup registration of configured servers into a [`SourceSet`](registry::SourceSet).
pub mod registry;

/// `reqwest` implementation of [`BotApi`].
pub mod rest;

/// Unique name of a monitored bot.
#[derive(
    Debug,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Deserialize,
    Serialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct SourceName(pub SmolStr);

impl From<&str> for SourceName {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl AsRef<str> for SourceName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Identity and static configuration of one remote bot.
///
/// Immutable after registration except for the enabled flag.
#[derive(Debug)]
pub struct Source {
    name: SourceName,
    base_url: Url,
    version: SmolStr,
    config: BotConfig,
    enabled: AtomicBool,
}

impl Source {
    pub fn new(name: SourceName, base_url: Url, version: SmolStr, config: BotConfig) -> Self {
        Self {
            name,
            base_url,
            version,
            config,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &SourceName {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Flip the enabled flag, returning the new state.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::AcqRel)
    }
}

/// Adapter turning [`DataCategory`] requests into normalized [`Payload`]s for one bot.
pub struct RemoteSource {
    source: Source,
    api: Arc<dyn BotApi>,
    history: tokio::sync::Mutex<ClosedTradeHistory>,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteSource {
    pub fn new(source: Source, api: Arc<dyn BotApi>, timeout: Duration) -> Self {
        Self {
            source,
            api,
            history: tokio::sync::Mutex::new(ClosedTradeHistory::default()),
            timeout,
        }
    }

    /// Verify connectivity and credentials, then capture the bot's static configuration.
    ///
    /// The source is named `name` if given, else by the bot's own `bot_name`, else by
    /// `fallback_name`.
    pub async fn connect(
        name: Option<SmolStr>,
        fallback_name: &str,
        base_url: Url,
        api: Arc<dyn BotApi>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let version = bounded(timeout, api.version()).await?.version;
        let config = bounded(timeout, api.show_config()).await?;

        let name = name
            .or_else(|| config.bot_name.clone().filter(|bot_name| !bot_name.is_empty()))
            .unwrap_or_else(|| SmolStr::new(fallback_name));

        let source = Source::new(SourceName(name), base_url, version, config);
        Ok(Self::new(source, api, timeout))
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn name(&self) -> &SourceName {
        self.source.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_enabled()
    }

    /// Fetch and normalize one category. Every upstream call is bounded by the timeout.
    pub async fn fetch(&self, category: &DataCategory) -> Result<Payload, FetchError> {
        let api = self.api.as_ref();
        let timeout = self.timeout;

        let payload = match category {
            DataCategory::OpenTrades => {
                let mut trades = bounded(timeout, api.status())
                    .await?
                    .into_iter()
                    .map(OpenTrade::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                trades.sort_by(|a, b| b.trade_id.cmp(&a.trade_id));
                Payload::OpenTrades(trades)
            }
            DataCategory::ClosedTrades => {
                let mut history = self.history.lock().await;
                Payload::ClosedTrades(history.refresh(api, timeout).await?)
            }
            DataCategory::TagSummary => {
                let trades = {
                    let mut history = self.history.lock().await;
                    history.refresh(api, timeout).await?
                };
                Payload::TagSummary(tag_summary(&trades))
            }
            DataCategory::Performance => {
                Payload::Performance(bounded(timeout, api.performance()).await?)
            }
            DataCategory::DailyProfit(days) => {
                Payload::PeriodProfit(bounded(timeout, api.daily(*days)).await?.data)
            }
            DataCategory::WeeklyProfit(weeks) => {
                Payload::PeriodProfit(bounded(timeout, api.weekly(*weeks)).await?.data)
            }
            DataCategory::MonthlyProfit(months) => {
                Payload::PeriodProfit(bounded(timeout, api.monthly(*months)).await?.data)
            }
            DataCategory::Logs(limit) => {
                Payload::Logs(bounded(timeout, api.logs(*limit)).await?.into())
            }
            DataCategory::SysInfo => Payload::SysInfo(bounded(timeout, api.sysinfo()).await?),
            DataCategory::Candles(CandleKey {
                pair,
                timeframe,
                limit,
            }) => {
                let response = bounded(timeout, api.pair_candles(pair, timeframe, *limit)).await?;
                Payload::Candles(response.into_candles()?)
            }
            DataCategory::ProfitSummary => {
                Payload::ProfitSummary(bounded(timeout, api.profit()).await?)
            }
            DataCategory::Whitelist => Payload::Whitelist(
                bounded(timeout, api.whitelist())
                    .await?
                    .whitelist
                    .unwrap_or_default(),
            ),
            DataCategory::TradeCount => Payload::TradeCount(bounded(timeout, api.count()).await?),
        };

        Ok(payload)
    }

    /// On-demand lookup of a single trade, bypassing the cache.
    pub async fn trade(&self, trade_id: u64) -> Result<Trade, FetchError> {
        bounded(self.timeout, self.api.trade(trade_id)).await
    }

    /// Total reported when the closed trade memo was last filled.
    pub async fn memoised_closed_total(&self) -> Option<u64> {
        self.history.lock().await.total()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    //! Scripted in-memory [`BotApi`] used across the crate's tests.

    use super::api::BotApi;
    use crate::{
        error::FetchError,
        model::{
            candle::PairCandlesResponse,
            profit::{PairPerformance, ProfitSummary, TimescaleResponse},
            system::{
                BotConfig, LogsResponse, SysInfo, TradeCount, VersionResponse, WhitelistResponse,
            },
            trade::{Trade, TradesPage},
        },
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct MockApi {
        pub closed_total: Mutex<u64>,
        pub page_requests: Mutex<Vec<u64>>,
        pub open: Mutex<Vec<Trade>>,
        pub fail_with: Mutex<Option<FetchError>>,
        pub delay: Mutex<Option<Duration>>,
        pub calls: Mutex<u64>,
    }

    pub fn trade_json(trade_id: u64, open: bool) -> Trade {
        let base = 1_700_000_000_000_i64 + (trade_id as i64) * 60_000;
        serde_json::from_value(serde_json::json!({
            "trade_id": trade_id,
            "pair": "BTC/USDT",
            "is_open": open,
            "open_rate": 100.0,
            "stake_amount": 10.0,
            "profit_abs": if trade_id % 2 == 0 { 1.0 } else { -0.5 },
            "enter_tag": if trade_id % 3 == 0 { "dip" } else { "breakout" },
            "open_timestamp": base,
            "close_timestamp": if open { serde_json::Value::Null } else { (base + 30_000).into() },
        }))
        .unwrap()
    }

    impl MockApi {
        pub fn with_closed_total(total: u64) -> Self {
            let api = Self::default();
            *api.closed_total.lock() = total;
            api
        }

        async fn enter(&self) -> Result<(), FetchError> {
            *self.calls.lock() += 1;
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match self.fail_with.lock().clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        fn profit_summary(&self) -> ProfitSummary {
            let closed = *self.closed_total.lock();
            ProfitSummary {
                profit_closed_coin: 0.0,
                profit_all_coin: 0.0,
                trade_count: closed + self.open.lock().len() as u64,
                closed_trade_count: closed,
                winning_trades: 0,
                losing_trades: 0,
                first_trade_timestamp: None,
                bot_start_timestamp: None,
                profit_factor: None,
                max_drawdown: None,
            }
        }
    }

    #[async_trait]
    impl BotApi for MockApi {
        async fn version(&self) -> Result<VersionResponse, FetchError> {
            self.enter().await?;
            Ok(VersionResponse {
                version: "2024.9".into(),
            })
        }

        async fn show_config(&self) -> Result<BotConfig, FetchError> {
            self.enter().await?;
            Ok(serde_json::from_value(serde_json::json!({
                "bot_name": "mockbot",
                "timeframe": "5m",
                "stake_currency": "USDT",
            }))
            .unwrap())
        }

        async fn status(&self) -> Result<Vec<Trade>, FetchError> {
            self.enter().await?;
            Ok(self.open.lock().clone())
        }

        async fn trades(&self, offset: u64, limit: u32) -> Result<TradesPage, FetchError> {
            self.enter().await?;
            self.page_requests.lock().push(offset);
            let total = *self.closed_total.lock();
            let end = (offset + u64::from(limit)).min(total);
            let trades = (offset..end).map(|id| trade_json(id + 1, false)).collect();
            Ok(TradesPage {
                trades,
                trades_count: end.saturating_sub(offset),
                offset,
                total_trades: total,
            })
        }

        async fn trade(&self, trade_id: u64) -> Result<Trade, FetchError> {
            self.enter().await?;
            Ok(trade_json(trade_id, true))
        }

        async fn profit(&self) -> Result<ProfitSummary, FetchError> {
            self.enter().await?;
            Ok(self.profit_summary())
        }

        async fn daily(&self, _: u32) -> Result<TimescaleResponse, FetchError> {
            self.enter().await?;
            Ok(TimescaleResponse {
                data: vec![],
                stake_currency: None,
            })
        }

        async fn weekly(&self, _: u32) -> Result<TimescaleResponse, FetchError> {
            self.daily(0).await
        }

        async fn monthly(&self, _: u32) -> Result<TimescaleResponse, FetchError> {
            self.daily(0).await
        }

        async fn performance(&self) -> Result<Vec<PairPerformance>, FetchError> {
            self.enter().await?;
            Ok(vec![])
        }

        async fn pair_candles(
            &self,
            _: &str,
            _: &str,
            limit: u32,
        ) -> Result<PairCandlesResponse, FetchError> {
            self.enter().await?;
            let data = (0..limit)
                .map(|index| {
                    let ts = i64::from(index) * 300_000;
                    vec![
                        serde_json::json!(ts),
                        serde_json::json!(1.0),
                        serde_json::json!(2.0),
                        serde_json::json!(0.5),
                        serde_json::json!(1.5),
                    ]
                })
                .collect();
            Ok(PairCandlesResponse {
                columns: ["__date_ts", "open", "high", "low", "close"]
                    .iter()
                    .map(|column| column.to_string())
                    .collect(),
                data,
            })
        }

        async fn logs(&self, _: u32) -> Result<LogsResponse, FetchError> {
            self.enter().await?;
            Ok(LogsResponse { logs: vec![] })
        }

        async fn sysinfo(&self) -> Result<SysInfo, FetchError> {
            self.enter().await?;
            Ok(SysInfo {
                cpu_pct: vec![12.0],
                ram_pct: 40.0,
            })
        }

        async fn whitelist(&self) -> Result<WhitelistResponse, FetchError> {
            self.enter().await?;
            Ok(WhitelistResponse {
                whitelist: Some(vec!["BTC/USDT".into(), "ETH/USDT".into()]),
            })
        }

        async fn count(&self) -> Result<TradeCount, FetchError> {
            self.enter().await?;
            Ok(TradeCount {
                current: self.open.lock().len() as u64,
                max: 5.0,
                total_stake: 0.0,
            })
        }
    }
}
