use crate::{
    cache::{Snapshot, SnapshotCache},
    category::DataCategory,
    error::FetchError,
    payload::Payload,
    source::SourceName,
};
use std::sync::Arc;

/// What a panel shows for one cache key at read time.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState {
    /// Never populated.
    Loading,
    Fresh(Arc<Snapshot>),
    /// Latest refresh failed; last known good rows are still shown.
    Stale(Arc<Snapshot>),
    /// Every refresh so far has failed.
    Failed(Arc<Snapshot>),
}

impl PanelState {
    pub fn from_snapshot(snapshot: Option<Arc<Snapshot>>) -> Self {
        match snapshot {
            None => PanelState::Loading,
            Some(snapshot) if snapshot.is_ok() => PanelState::Fresh(snapshot),
            Some(snapshot) if snapshot.payload.is_some() => PanelState::Stale(snapshot),
            Some(snapshot) => PanelState::Failed(snapshot),
        }
    }

    pub fn read(cache: &SnapshotCache, source: &SourceName, category: &DataCategory) -> Self {
        Self::from_snapshot(cache.read(source, category))
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            PanelState::Loading => None,
            PanelState::Fresh(snapshot)
            | PanelState::Stale(snapshot)
            | PanelState::Failed(snapshot) => Some(snapshot),
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.snapshot()?.payload()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.snapshot()?.error()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PanelState::Loading)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.error().is_some_and(FetchError::is_persistent)
    }

    /// Indicator line for a failed refresh, if any.
    pub fn notice(&self) -> Option<String> {
        let error = self.error()?;
        if error.is_persistent() {
            return Some("Authentication failed: check the configured credentials".to_string());
        }

        let since = self
            .snapshot()
            .and_then(|snapshot| snapshot.last_success)
            .map(|time| format!(" (last update {})", time.format("%H:%M:%S")))
            .unwrap_or_default();
        Some(format!("Refresh failed: {}{since}", error.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TradeCount;
    use chrono::Utc;

    fn count() -> Payload {
        Payload::TradeCount(TradeCount {
            current: 2,
            max: 5.0,
            total_stake: 100.0,
        })
    }

    #[test]
    fn test_panel_state_from_cache() {
        struct TestCase {
            input: Vec<Result<Payload, FetchError>>,
            expected_loading: bool,
            expected_payload: bool,
            expected_unauthorized: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: never populated
                input: vec![],
                expected_loading: true,
                expected_payload: false,
                expected_unauthorized: false,
            },
            TestCase {
                // TC1: fresh
                input: vec![Ok(count())],
                expected_loading: false,
                expected_payload: true,
                expected_unauthorized: false,
            },
            TestCase {
                // TC2: stale keeps rows
                input: vec![Ok(count()), Err(FetchError::Connectivity("reset".to_string()))],
                expected_loading: false,
                expected_payload: true,
                expected_unauthorized: false,
            },
            TestCase {
                // TC3: unauthorized from the start
                input: vec![Err(FetchError::Unauthorized)],
                expected_loading: false,
                expected_payload: false,
                expected_unauthorized: true,
            },
        ];

        let bot = SourceName::from("bot1");
        for (index, test) in tests.into_iter().enumerate() {
            let cache = SnapshotCache::new();
            for result in test.input {
                cache.write(&bot, &DataCategory::TradeCount, Utc::now(), result);
            }

            let actual = PanelState::read(&cache, &bot, &DataCategory::TradeCount);
            assert_eq!(actual.is_loading(), test.expected_loading, "TC{} failed", index);
            assert_eq!(actual.payload().is_some(), test.expected_payload, "TC{} failed", index);
            assert_eq!(
                actual.is_unauthorized(),
                test.expected_unauthorized,
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_notice() {
        let bot = SourceName::from("bot1");
        let cache = SnapshotCache::new();
        cache.write(&bot, &DataCategory::TradeCount, Utc::now(), Ok(count()));
        assert_eq!(PanelState::read(&cache, &bot, &DataCategory::TradeCount).notice(), None);

        cache.write(
            &bot,
            &DataCategory::TradeCount,
            Utc::now(),
            Err(FetchError::malformed("/api/v1/count", "eof")),
        );
        let stale = PanelState::read(&cache, &bot, &DataCategory::TradeCount);
        assert!(matches!(stale, PanelState::Stale(_)));
        let notice = stale.notice().unwrap();
        assert!(notice.starts_with("Refresh failed: malformed response (last update "));

        cache.write(&bot, &DataCategory::TradeCount, Utc::now(), Err(FetchError::Unauthorized));
        let unauthorized = PanelState::read(&cache, &bot, &DataCategory::TradeCount);
        assert!(unauthorized.notice().unwrap().starts_with("Authentication failed"));
    }
}
