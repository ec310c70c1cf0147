//! Cross-source folds over cached snapshots: the combined closed trade list, dashboard
//! totals, per-bot trade summaries and the cumulative profit series.
//!
//! Aggregates are rebuilt from the cache on every read or, for [`AllClosed`], whenever a
//! contributing snapshot changes. Nothing here is fetched independently.

use crate::{
    cache::SnapshotCache,
    category::DataCategory,
    model::{ClosedTrade, OpenTrade, PeriodProfit, ProfitSummary, trade::round2},
    source::SourceName,
};
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use smol_str::{SmolStr, format_smolstr};
use std::sync::Arc;

/// A trade row tagged with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BotTrade<T> {
    pub source: SourceName,
    pub trade: T,
}

/// Closed trades of every given source, newest first.
#[derive(Debug, Clone, Default)]
pub struct AllClosed {
    inputs: Vec<(SourceName, Arc<Vec<ClosedTrade>>)>,
    trades: Arc<Vec<BotTrade<ClosedTrade>>>,
}

impl AllClosed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> &Arc<Vec<BotTrade<ClosedTrade>>> {
        &self.trades
    }

    /// Re-fold if the set of contributing rows changed. Returns whether it recomputed.
    pub fn refresh<'a>(
        &mut self,
        cache: &SnapshotCache,
        sources: impl IntoIterator<Item = &'a SourceName>,
    ) -> bool {
        let inputs: Vec<(SourceName, Arc<Vec<ClosedTrade>>)> = sources
            .into_iter()
            .filter_map(|source| {
                let snapshot = cache.read(source, &DataCategory::ClosedTrades)?;
                let rows = Arc::clone(snapshot.payload()?.closed_trades()?);
                Some((source.clone(), rows))
            })
            .collect();

        let unchanged = inputs.len() == self.inputs.len()
            && inputs
                .iter()
                .zip(&self.inputs)
                .all(|((name, rows), (memo_name, memo_rows))| {
                    name == memo_name && Arc::ptr_eq(rows, memo_rows)
                });
        if unchanged {
            return false;
        }

        let trades = inputs
            .iter()
            .flat_map(|(source, rows)| {
                rows.iter().map(|trade| BotTrade {
                    source: source.clone(),
                    trade: trade.clone(),
                })
            })
            .sorted_by(|a, b| b.trade.close_date.cmp(&a.trade.close_date))
            .collect();

        self.inputs = inputs;
        self.trades = Arc::new(trades);
        true
    }
}

/// Open trades of every given source, most recently opened first.
pub fn all_open<'a>(
    cache: &SnapshotCache,
    sources: impl IntoIterator<Item = &'a SourceName>,
) -> Vec<BotTrade<OpenTrade>> {
    sources
        .into_iter()
        .filter_map(|source| {
            let snapshot = cache.read(source, &DataCategory::OpenTrades)?;
            let rows: Vec<BotTrade<OpenTrade>> = snapshot
                .payload()?
                .open_trades()?
                .iter()
                .map(|trade| BotTrade {
                    source: source.clone(),
                    trade: trade.clone(),
                })
                .collect();
            Some(rows)
        })
        .flatten()
        .sorted_by(|a, b| b.trade.open_date.cmp(&a.trade.open_date))
        .collect()
}

/// Summed figures for the dashboard header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardTotals {
    pub open_trades: u64,
    pub closed_trades: u64,
    pub open_profit: f64,
    pub closed_profit: f64,
    pub today: f64,
    pub yesterday: f64,
    pub this_week: f64,
    pub last_week: f64,
    pub this_month: f64,
    pub last_month: f64,
}

impl DashboardTotals {
    pub fn fold<'a>(cache: &SnapshotCache, sources: impl IntoIterator<Item = &'a SourceName>) -> Self {
        let mut totals = Self::default();

        for source in sources {
            let read = |category: &DataCategory| cache.read(source, category);

            let summary = read(&DataCategory::ProfitSummary);
            if let Some(summary) = summary
                .as_ref()
                .and_then(|snapshot| snapshot.payload()?.profit_summary())
            {
                totals.open_trades += summary.open_trade_count();
                totals.closed_trades += summary.closed_trade_count;
                totals.closed_profit += summary.profit_closed_coin;
            }

            let open = read(&DataCategory::OpenTrades);
            if let Some(open) = open
                .as_ref()
                .and_then(|snapshot| snapshot.payload()?.open_trades())
            {
                totals.open_profit += open.iter().map(|trade| trade.profit_abs).sum::<f64>();
            }

            let periods = [
                (DataCategory::DailyProfit(2), &mut totals.today, &mut totals.yesterday),
                (DataCategory::WeeklyProfit(2), &mut totals.this_week, &mut totals.last_week),
                (DataCategory::MonthlyProfit(2), &mut totals.this_month, &mut totals.last_month),
            ];
            for (category, current, previous) in periods {
                let Some(snapshot) = read(&category) else {
                    continue;
                };
                if let Some(rows) = snapshot.payload().and_then(|payload| payload.period_profit()) {
                    let (now, before) = current_and_previous(rows);
                    *current += now;
                    *previous += before;
                }
            }
        }

        totals.round()
    }

    fn round(self) -> Self {
        Self {
            open_profit: round2(self.open_profit),
            closed_profit: round2(self.closed_profit),
            today: round2(self.today),
            yesterday: round2(self.yesterday),
            this_week: round2(self.this_week),
            last_week: round2(self.last_week),
            this_month: round2(self.this_month),
            last_month: round2(self.last_month),
            ..self
        }
    }
}

/// Rows of `/daily`, `/weekly` and `/monthly` are newest first.
fn current_and_previous(rows: &[PeriodProfit]) -> (f64, f64) {
    let profit = |index: usize| rows.get(index).map(|row| row.abs_profit).unwrap_or_default();
    (profit(0), profit(1))
}

/// Win/loss statistics of one bot.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSummary {
    pub source: SourceName,
    pub bot_start: Option<DateTime<Utc>>,
    pub open_count: usize,
    pub closed_count: usize,
    pub open_profit: f64,
    pub closed_profit: f64,
    pub wins: usize,
    pub losses: usize,
    pub winrate: f64,
    pub expectancy: f64,
    /// Infinite when there are no losing trades.
    pub expectancy_ratio: f64,
    pub mean_win: f64,
    pub median_win: f64,
    /// Negative, like the losses it averages.
    pub mean_loss: f64,
    pub median_loss: f64,
}

impl TradeSummary {
    pub fn compute(
        source: SourceName,
        open: &[OpenTrade],
        closed: &[ClosedTrade],
        profit: Option<&ProfitSummary>,
    ) -> Self {
        let (winners, losers): (Vec<f64>, Vec<f64>) = closed
            .iter()
            .map(|trade| trade.profit_abs)
            .partition(|profit_abs| *profit_abs >= 0.0);

        let mean_win = round2(mean(&winners));
        let mean_loss = round2(mean(&losers));
        let decided = winners.len() + losers.len();
        let winrate = if decided == 0 {
            0.0
        } else {
            winners.len() as f64 / decided as f64 * 100.0
        };
        let loserate = if decided == 0 { 0.0 } else { 100.0 - winrate };

        let expectancy_ratio = if mean_loss.abs() > 0.0 {
            (1.0 + mean_win / mean_loss.abs()) * (winrate / 100.0) - 1.0
        } else {
            f64::INFINITY
        };
        let expectancy = winrate / 100.0 * mean_win - loserate / 100.0 * mean_loss.abs();

        let closed_profit = profit
            .map(|summary| summary.profit_closed_coin)
            .unwrap_or_else(|| closed.iter().map(|trade| trade.profit_abs).sum());

        Self {
            source,
            bot_start: profit.and_then(ProfitSummary::bot_start),
            open_count: open.len(),
            closed_count: closed.len(),
            open_profit: round2(open.iter().map(|trade| trade.profit_abs).sum()),
            closed_profit: round2(closed_profit),
            wins: winners.len(),
            losses: losers.len(),
            winrate,
            expectancy,
            expectancy_ratio,
            mean_win,
            median_win: round2(median(winners)),
            mean_loss,
            median_loss: round2(median(losers)),
        }
    }

    /// Summary from whatever rows the cache holds for the source.
    pub fn read(cache: &SnapshotCache, source: &SourceName) -> Self {
        let open = cache.read(source, &DataCategory::OpenTrades);
        let closed = cache.read(source, &DataCategory::ClosedTrades);
        let profit = cache.read(source, &DataCategory::ProfitSummary);

        Self::compute(
            source.clone(),
            open.as_ref()
                .and_then(|snapshot| snapshot.payload()?.open_trades())
                .unwrap_or_default(),
            closed
                .as_ref()
                .and_then(|snapshot| snapshot.payload()?.closed_trades())
                .map(|rows| rows.as_slice())
                .unwrap_or_default(),
            profit
                .as_ref()
                .and_then(|snapshot| snapshot.payload()?.profit_summary()),
        )
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[middle - 1] + values[middle]) / 2.0
    } else {
        values[middle]
    }
}

/// One day of the cumulative profit chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitPoint {
    pub date: NaiveDate,
    pub profit: f64,
    pub cumulative: f64,
}

/// Daily binned profit by open date with a running total. Days without trades are kept
/// with zero profit so the series is continuous. An empty selection keeps every source.
pub fn cumulative_profit(
    trades: &[BotTrade<ClosedTrade>],
    selected: &[SourceName],
) -> Vec<ProfitPoint> {
    let bins = trades
        .iter()
        .filter(|row| selected.is_empty() || selected.contains(&row.source))
        .map(|row| (row.trade.open_date.date_naive(), row.trade.profit_abs))
        .into_grouping_map()
        .sum();

    let (Some(first), Some(last)) = (bins.keys().min().copied(), bins.keys().max().copied()) else {
        return Vec::new();
    };

    let mut cumulative = 0.0;
    first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| {
            let profit = bins.get(&date).copied().unwrap_or_default();
            cumulative += profit;
            ProfitPoint {
                date,
                profit: round2(profit),
                cumulative: round2(cumulative),
            }
        })
        .collect()
}

/// Pair charted when a bot screen opens: the first open trade's pair, else the most recent
/// closed trade's pair, else BTC against the stake currency.
pub fn default_chart_pair(
    open: &[OpenTrade],
    closed: &[ClosedTrade],
    stake_currency: &str,
) -> SmolStr {
    open.first()
        .map(|trade| trade.pair.clone())
        .or_else(|| closed.first().map(|trade| trade.pair.clone()))
        .unwrap_or_else(|| format_smolstr!("BTC/{stake_currency}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Side, TradeCount},
        payload::Payload,
    };
    use chrono::TimeZone;

    fn closed(trade_id: u64, day: u32, profit_abs: f64) -> ClosedTrade {
        let open_date = Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap();
        ClosedTrade {
            trade_id,
            pair: "ETH/USDT".into(),
            side: Side::Long,
            profit_pct: 0.0,
            profit_abs,
            open_date,
            close_date: open_date + chrono::Duration::hours(trade_id as i64),
            enter_tag: None,
            exit_reason: None,
            open_rate: 1.0,
            close_rate: Some(1.0),
            stake_amount: 10.0,
            leverage: 1.0,
        }
    }

    fn open(trade_id: u64, pair: &str, profit_abs: f64) -> OpenTrade {
        OpenTrade {
            trade_id,
            pair: pair.into(),
            display_pair: pair.to_string(),
            side: Side::Long,
            open_rate: 1.0,
            current_rate: None,
            stop_loss_pct: None,
            max_pct: 0.0,
            profit_pct: 0.0,
            profit_abs,
            open_date: Utc.with_ymd_and_hms(2024, 3, 1, trade_id as u32, 0, 0).unwrap(),
            enter_tag: None,
            stake_amount: 10.0,
            leverage: 1.0,
            order_count: 1,
        }
    }

    fn period(abs_profit: f64) -> PeriodProfit {
        PeriodProfit {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            abs_profit,
            rel_profit: None,
            trade_count: 1,
        }
    }

    fn bot(name: &str) -> SourceName {
        SourceName::from(name)
    }

    #[test]
    fn test_all_closed_recomputes_only_on_change() {
        let cache = SnapshotCache::new();
        let bot1_rows = Arc::new(vec![closed(1, 1, 1.0), closed(3, 1, 1.0)]);
        let bot2_rows = Arc::new(vec![closed(2, 1, -1.0)]);
        cache.write(&bot("bot1"), &DataCategory::ClosedTrades, Utc::now(), Ok(Payload::ClosedTrades(Arc::clone(&bot1_rows))));
        cache.write(&bot("bot2"), &DataCategory::ClosedTrades, Utc::now(), Ok(Payload::ClosedTrades(Arc::clone(&bot2_rows))));

        let sources = [bot("bot1"), bot("bot2")];
        let mut all = AllClosed::new();
        assert!(all.refresh(&cache, &sources));
        let ids: Vec<u64> = all.trades().iter().map(|row| row.trade.trade_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        // Same rows rewritten by an unchanged-count refresh
        cache.write(&bot("bot1"), &DataCategory::ClosedTrades, Utc::now(), Ok(Payload::ClosedTrades(Arc::clone(&bot1_rows))));
        assert!(!all.refresh(&cache, &sources));

        // Failed refresh carries the rows forward
        cache.write(&bot("bot2"), &DataCategory::ClosedTrades, Utc::now(), Err(crate::error::FetchError::Unauthorized));
        assert!(!all.refresh(&cache, &sources));

        // Deselecting a source changes the inputs
        assert!(all.refresh(&cache, &sources[..1]));
        assert_eq!(all.trades().len(), 2);
    }

    #[test]
    fn test_all_open_merges_sources() {
        let cache = SnapshotCache::new();
        cache.write(&bot("bot1"), &DataCategory::OpenTrades, Utc::now(), Ok(Payload::OpenTrades(vec![open(1, "BTC/USDT", 1.0)])));
        cache.write(&bot("bot2"), &DataCategory::OpenTrades, Utc::now(), Ok(Payload::OpenTrades(vec![open(5, "ETH/USDT", 2.0)])));

        let rows = all_open(&cache, &[bot("bot1"), bot("bot2"), bot("bot3")]);
        let actual: Vec<(&str, u64)> = rows
            .iter()
            .map(|row| (row.source.as_ref(), row.trade.trade_id))
            .collect();
        assert_eq!(actual, vec![("bot2", 5), ("bot1", 1)]);
    }

    #[test]
    fn test_dashboard_totals() {
        let cache = SnapshotCache::new();
        let summary = |closed_profit: f64| ProfitSummary {
            profit_closed_coin: closed_profit,
            profit_all_coin: closed_profit,
            trade_count: 12,
            closed_trade_count: 10,
            winning_trades: 6,
            losing_trades: 4,
            first_trade_timestamp: None,
            bot_start_timestamp: None,
            profit_factor: None,
            max_drawdown: None,
        };

        for (name, closed_profit) in [("bot1", 10.004), ("bot2", -2.5)] {
            let source = bot(name);
            cache.write(&source, &DataCategory::ProfitSummary, Utc::now(), Ok(Payload::ProfitSummary(summary(closed_profit))));
            cache.write(&source, &DataCategory::OpenTrades, Utc::now(), Ok(Payload::OpenTrades(vec![open(1, "BTC/USDT", 0.5)])));
            cache.write(&source, &DataCategory::DailyProfit(2), Utc::now(), Ok(Payload::PeriodProfit(vec![period(1.0), period(2.0)])));
            cache.write(&source, &DataCategory::MonthlyProfit(2), Utc::now(), Ok(Payload::PeriodProfit(vec![period(3.0)])));
        }
        // Unrelated payloads are ignored
        cache.write(&bot("bot1"), &DataCategory::TradeCount, Utc::now(), Ok(Payload::TradeCount(TradeCount { current: 1, max: 3.0, total_stake: 1.0 })));

        let actual = DashboardTotals::fold(&cache, &[bot("bot1"), bot("bot2")]);
        let expected = DashboardTotals {
            open_trades: 4,
            closed_trades: 20,
            open_profit: 1.0,
            closed_profit: 7.5,
            today: 2.0,
            yesterday: 4.0,
            this_week: 0.0,
            last_week: 0.0,
            this_month: 6.0,
            last_month: 0.0,
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_trade_summary() {
        struct TestCase {
            input: Vec<f64>,
            expected_winrate: f64,
            expected_expectancy: f64,
            expected_ratio: f64,
            expected_median_loss: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: no trades
                input: vec![],
                expected_winrate: 0.0,
                expected_expectancy: 0.0,
                expected_ratio: f64::INFINITY,
                expected_median_loss: 0.0,
            },
            TestCase {
                // TC1: only winners, zero profit counts as a win
                input: vec![2.0, 0.0],
                expected_winrate: 100.0,
                expected_expectancy: 1.0,
                expected_ratio: f64::INFINITY,
                expected_median_loss: 0.0,
            },
            TestCase {
                // TC2: 3 wins averaging 2, 1 loss of 2
                input: vec![1.0, 2.0, 3.0, -2.0],
                expected_winrate: 75.0,
                expected_expectancy: 1.0,
                expected_ratio: 0.5,
                expected_median_loss: -2.0,
            },
            TestCase {
                // TC3: two losses, even-length median
                input: vec![4.0, -1.0, -3.0],
                expected_winrate: 100.0 / 3.0,
                expected_expectancy: 4.0 / 3.0 - 4.0 / 3.0,
                expected_ratio: (1.0 + 4.0 / 2.0) * (1.0 / 3.0) - 1.0,
                expected_median_loss: -2.0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let trades: Vec<ClosedTrade> = test
                .input
                .iter()
                .enumerate()
                .map(|(id, profit)| closed(id as u64, 1, *profit))
                .collect();

            let actual = TradeSummary::compute(bot("bot1"), &[], &trades, None);
            assert!((actual.winrate - test.expected_winrate).abs() < 1e-9, "TC{} failed", index);
            assert!((actual.expectancy - test.expected_expectancy).abs() < 1e-9, "TC{} failed", index);
            if test.expected_ratio.is_infinite() {
                assert!(actual.expectancy_ratio.is_infinite(), "TC{} failed", index);
            } else {
                assert!((actual.expectancy_ratio - test.expected_ratio).abs() < 1e-9, "TC{} failed", index);
            }
            assert_eq!(actual.median_loss, test.expected_median_loss, "TC{} failed", index);
        }
    }

    #[test]
    fn test_trade_summary_read_from_cache() {
        let cache = SnapshotCache::new();
        cache.write(&bot("bot1"), &DataCategory::OpenTrades, Utc::now(), Ok(Payload::OpenTrades(vec![open(1, "BTC/USDT", 0.25), open(2, "ETH/USDT", 0.5)])));
        cache.write(&bot("bot1"), &DataCategory::ClosedTrades, Utc::now(), Ok(Payload::ClosedTrades(Arc::new(vec![closed(1, 1, 1.5)]))));

        let actual = TradeSummary::read(&cache, &bot("bot1"));
        assert_eq!(actual.open_count, 2);
        assert_eq!(actual.open_profit, 0.75);
        assert_eq!(actual.closed_profit, 1.5);
        assert_eq!(actual.bot_start, None);
    }

    #[test]
    fn test_cumulative_profit() {
        let trades = vec![
            BotTrade { source: bot("bot1"), trade: closed(1, 1, 1.0) },
            BotTrade { source: bot("bot2"), trade: closed(2, 1, 2.0) },
            BotTrade { source: bot("bot1"), trade: closed(3, 3, -0.5) },
        ];

        let all = cumulative_profit(&trades, &[]);
        let actual: Vec<(u32, f64, f64)> = all
            .iter()
            .map(|point| (chrono::Datelike::day(&point.date), point.profit, point.cumulative))
            .collect();
        assert_eq!(actual, vec![(1, 3.0, 3.0), (2, 0.0, 3.0), (3, -0.5, 2.5)]);

        let bot1 = cumulative_profit(&trades, &[bot("bot1")]);
        assert_eq!(bot1.last().map(|point| point.cumulative), Some(0.5));

        assert!(cumulative_profit(&[], &[]).is_empty());
    }

    #[test]
    fn test_default_chart_pair() {
        struct TestCase {
            open: Vec<OpenTrade>,
            closed: Vec<ClosedTrade>,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: open trade wins
                open: vec![open(1, "SOL/USDT", 0.0)],
                closed: vec![closed(1, 1, 1.0)],
                expected: "SOL/USDT",
            },
            TestCase {
                // TC1: falls back to closed trades
                open: vec![],
                closed: vec![closed(1, 1, 1.0)],
                expected: "ETH/USDT",
            },
            TestCase {
                // TC2: falls back to the stake currency
                open: vec![],
                closed: vec![],
                expected: "BTC/USDC",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = default_chart_pair(&test.open, &test.closed, "USDC");
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
