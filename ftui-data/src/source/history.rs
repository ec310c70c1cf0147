//! Closed trade history pagination.
//!
//! The upstream serves closed trades in fixed pages of [`PAGE_SIZE`], oldest first. The full
//! history is assembled by requesting every page in ascending offset order and reversing
//! the concatenation, so the canonical order is newest-first. The result is memoised
//! against the reported `closed_trade_count`: an unchanged count issues no page requests.

use super::api::BotApi;
use crate::{error::FetchError, model::trade::ClosedTrade};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::debug;

/// Maximum number of trades the upstream returns per page.
pub const PAGE_SIZE: u32 = 500;

/// Offsets of every page needed to cover `total` trades: `ceil(total / PAGE_SIZE)` pages.
pub fn page_offsets(total: u64) -> Vec<u64> {
    let page_size = u64::from(PAGE_SIZE);
    let pages = total.div_ceil(page_size);
    (0..pages).map(|page| page * page_size).collect()
}

/// Concatenate pages fetched in ascending offset order and reverse into newest-first.
pub fn concat_newest_first<T>(pages: Vec<Vec<T>>) -> Vec<T> {
    let mut rows: Vec<T> = pages.into_iter().flatten().collect();
    rows.reverse();
    rows
}

/// Memoised closed trade history for one source.
#[derive(Debug, Default)]
pub struct ClosedTradeHistory {
    total: Option<u64>,
    trades: Arc<Vec<ClosedTrade>>,
}

impl ClosedTradeHistory {
    /// Total reported by the upstream when the memo was last filled.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn trades(&self) -> &Arc<Vec<ClosedTrade>> {
        &self.trades
    }

    /// Bring the memo up to date, returning the newest-first history.
    ///
    /// Every upstream call is bounded by `timeout`. On failure the memo is left untouched.
    pub async fn refresh(
        &mut self,
        api: &dyn BotApi,
        timeout: Duration,
    ) -> Result<Arc<Vec<ClosedTrade>>, FetchError> {
        let total = bounded(timeout, api.profit()).await?.closed_trade_count;

        if self.total == Some(total) {
            return Ok(Arc::clone(&self.trades));
        }

        let offsets = page_offsets(total);
        debug!(total, pages = offsets.len(), "fetching closed trade history");

        let mut pages = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let page = bounded(timeout, api.trades(offset, PAGE_SIZE)).await?;
            let rows = page
                .trades
                .into_iter()
                .map(ClosedTrade::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            pages.push(rows);
        }

        self.total = Some(total);
        self.trades = Arc::new(concat_newest_first(pages));
        Ok(Arc::clone(&self.trades))
    }
}

/// Apply a per-call timeout, recording expiry as [`FetchError::Timeout`].
pub(crate) async fn bounded<T, F>(timeout: Duration, future: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| FetchError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        struct TestCase {
            input: u64,
            expected: Vec<u64>,
        }

        let tests = vec![
            TestCase {
                // TC0: no trades, no pages
                input: 0,
                expected: vec![],
            },
            TestCase {
                // TC1: partial single page
                input: 1,
                expected: vec![0],
            },
            TestCase {
                // TC2: exactly one page
                input: 500,
                expected: vec![0],
            },
            TestCase {
                // TC3: one past a page boundary
                input: 501,
                expected: vec![0, 500],
            },
            TestCase {
                // TC4: 1200 trades need 3 pages
                input: 1200,
                expected: vec![0, 500, 1000],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = page_offsets(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_concat_newest_first() {
        struct TestCase {
            input: Vec<Vec<u32>>,
            expected: Vec<u32>,
        }

        let tests = vec![
            TestCase {
                // TC0: zero pages
                input: vec![],
                expected: vec![],
            },
            TestCase {
                // TC1: single page
                input: vec![vec![1, 2, 3]],
                expected: vec![3, 2, 1],
            },
            TestCase {
                // TC2: several pages, uneven tail
                input: vec![vec![1, 2], vec![3, 4], vec![5]],
                expected: vec![5, 4, 3, 2, 1],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = concat_newest_first(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_concat_newest_first_reversed_twice_restores_page_order() {
        let pages = vec![vec![10, 11, 12], vec![13, 14]];
        let flattened: Vec<u32> = pages.clone().into_iter().flatten().collect();

        let mut restored = concat_newest_first(pages);
        assert!(restored.windows(2).all(|pair| pair[0] > pair[1]));

        restored.reverse();
        assert_eq!(restored, flattened);
    }
}
