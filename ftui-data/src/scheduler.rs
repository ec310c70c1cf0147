//! Background refresh of every (source, category) key at its cadence.
//!
//! One interval loop per [`Cadence`] fans out over the enabled sources, spawning a tokio task
//! per key. The per-key in-flight flag lives in the [`SnapshotCache`], so a key that is
//! already fetching is coalesced rather than queued, and a [`Semaphore`] bounds the number
//! of concurrent upstream calls.

use crate::{
    cache::{FetchTicket, SnapshotCache, WriteOutcome},
    category::{Cadence, DataCategory},
    config::Config,
    error::{ErrorKind, FetchError},
    source::{RemoteSource, SourceName, registry::SourceSet},
};
use chrono::Utc;
use fnv::FnvHashMap;
use indexmap::IndexSet;
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Semaphore,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub pool_size: usize,
    pub fast: Duration,
    pub medium: Duration,
    pub slow: Duration,
    /// Categories refreshed for every enabled source.
    pub standing: Vec<DataCategory>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            fast: Cadence::Fast.default_period(),
            medium: Cadence::Medium.default_period(),
            slow: Cadence::Slow.default_period(),
            standing: DataCategory::standing(100, true),
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            pool_size: config.refresh.pool_size,
            fast: config.refresh.period(Cadence::Fast),
            medium: config.refresh.period(Cadence::Medium),
            slow: config.refresh.period(Cadence::Slow),
            standing: DataCategory::standing(config.display.log_limit, config.display.show_sysinfo),
        }
    }
}

impl SchedulerConfig {
    pub fn period(&self, cadence: Cadence) -> Duration {
        match cadence {
            Cadence::Fast => self.fast,
            Cadence::Medium => self.medium,
            Cadence::Slow => self.slow,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_period(mut self, cadence: Cadence, period: Duration) -> Self {
        match cadence {
            Cadence::Fast => self.fast = period,
            Cadence::Medium => self.medium = period,
            Cadence::Slow => self.slow = period,
        }
        self
    }

    pub fn with_standing(mut self, standing: Vec<DataCategory>) -> Self {
        self.standing = standing;
        self
    }
}

/// Result of [`Scheduler::request_refresh`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RefreshRequest {
    Spawned,
    /// The key was already fetching; its result will satisfy this request.
    Coalesced,
    SourceDisabled,
    UnknownSource,
}

/// Counts produced by one cadence tick.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TickReport {
    pub spawned: usize,
    pub coalesced: usize,
    /// Disabled sources left out of the fan-out.
    pub skipped: usize,
}

/// Change in a key's outcome worth logging.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transition {
    Failing(ErrorKind),
    Recovered(ErrorKind),
}

/// Compare the outcome kind before and after a write. `None` means healthy or never fetched.
pub fn transition(before: Option<ErrorKind>, after: Option<ErrorKind>) -> Option<Transition> {
    match (before, after) {
        (before, after) if before == after => None,
        (Some(kind), None) => Some(Transition::Recovered(kind)),
        (_, Some(kind)) => Some(Transition::Failing(kind)),
        (None, None) => None,
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    sources: Arc<SourceSet>,
    cache: Arc<SnapshotCache>,
    permits: Arc<Semaphore>,
    config: SchedulerConfig,
    watched: RwLock<FnvHashMap<SourceName, IndexSet<DataCategory>>>,
}

impl Scheduler {
    pub fn new(sources: Arc<SourceSet>, cache: Arc<SnapshotCache>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sources,
                cache,
                permits: Arc::new(Semaphore::new(config.pool_size.max(1))),
                config,
                watched: RwLock::new(FnvHashMap::default()),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.inner.cache
    }

    pub fn sources(&self) -> &Arc<SourceSet> {
        &self.inner.sources
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Spawn one interval loop per cadence. Each loop ticks immediately, then every period.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        Cadence::ALL
            .into_iter()
            .map(|cadence| {
                let scheduler = self.clone();
                let period = self.inner.config.period(cadence);
                tokio::spawn(async move {
                    info!(%cadence, ?period, "starting refresh loop");
                    let mut timer = interval(period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        timer.tick().await;
                        let report = scheduler.tick(cadence);
                        debug!(%cadence, ?report, "refresh tick");
                    }
                })
            })
            .collect()
    }

    /// Fan out one cadence over every enabled source.
    pub fn tick(&self, cadence: Cadence) -> TickReport {
        let mut report = TickReport::default();

        for remote in self.inner.sources.iter() {
            if !remote.is_enabled() {
                report.skipped += 1;
                continue;
            }

            for category in self.categories(remote.name(), cadence) {
                match self.spawn_fetch(remote, category) {
                    Some(_) => report.spawned += 1,
                    None => report.coalesced += 1,
                }
            }
        }

        report
    }

    /// Force an out-of-cycle fetch of one key.
    pub fn request_refresh(&self, source: &SourceName, category: DataCategory) -> RefreshRequest {
        let Some(remote) = self.inner.sources.get(source) else {
            return RefreshRequest::UnknownSource;
        };
        if !remote.is_enabled() {
            return RefreshRequest::SourceDisabled;
        }

        match self.spawn_fetch(remote, category) {
            Some(_) => RefreshRequest::Spawned,
            None => RefreshRequest::Coalesced,
        }
    }

    /// Add a category to the periodic fan-out of one source, in addition to the standing set.
    pub fn watch(&self, source: &SourceName, category: DataCategory) -> bool {
        self.inner
            .watched
            .write()
            .entry(source.clone())
            .or_default()
            .insert(category)
    }

    pub fn unwatch(&self, source: &SourceName, category: &DataCategory) -> bool {
        let mut watched = self.inner.watched.write();
        let Some(categories) = watched.get_mut(source) else {
            return false;
        };
        let removed = categories.shift_remove(category);
        if categories.is_empty() {
            watched.remove(source);
        }
        removed
    }

    pub fn watched(&self, source: &SourceName) -> Vec<DataCategory> {
        self.inner
            .watched
            .read()
            .get(source)
            .map(|categories| categories.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Standing plus watched categories of one source at the given cadence.
    fn categories(&self, source: &SourceName, cadence: Cadence) -> IndexSet<DataCategory> {
        let mut categories: IndexSet<DataCategory> = self
            .inner
            .config
            .standing
            .iter()
            .filter(|category| category.cadence() == cadence)
            .cloned()
            .collect();

        if let Some(watched) = self.inner.watched.read().get(source) {
            categories.extend(
                watched
                    .iter()
                    .filter(|category| category.cadence() == cadence)
                    .cloned(),
            );
        }

        categories
    }

    /// Claim the key and spawn its fetch. Returns `None` if the key is already fetching.
    fn spawn_fetch(&self, remote: &Arc<RemoteSource>, category: DataCategory) -> Option<JoinHandle<()>> {
        let ticket = self.inner.cache.try_begin(remote.name(), &category)?;
        let remote = Arc::clone(remote);
        let cache = Arc::clone(&self.inner.cache);
        let permits = Arc::clone(&self.inner.permits);

        Some(tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            run_fetch(&remote, &cache, ticket).await;
        }))
    }
}

async fn run_fetch(remote: &RemoteSource, cache: &SnapshotCache, ticket: FetchTicket) {
    let started_at = Utc::now();
    let result = remote.fetch(ticket.category()).await;
    let failure = result.as_ref().err().cloned();
    let source = ticket.source().clone();
    let category = ticket.category().clone();

    match ticket.complete(cache, started_at, result) {
        WriteOutcome::Stored { previous } => {
            let before = previous.and_then(|snapshot| snapshot.outcome.error_kind());
            log_transition(&source, &category, before, failure.as_ref());
        }
        WriteOutcome::Superseded => {
            debug!(%source, %category, "discarded superseded fetch result");
        }
    }
}

fn log_transition(
    source: &SourceName,
    category: &DataCategory,
    before: Option<ErrorKind>,
    failure: Option<&FetchError>,
) {
    match transition(before, failure.map(FetchError::kind)) {
        None => {}
        Some(Transition::Recovered(previous)) => {
            info!(%source, %category, %previous, "fetch recovered");
        }
        Some(Transition::Failing(ErrorKind::MalformedResponse)) => {
            if let Some(failure) = failure {
                error!(%source, %category, error = %failure, "malformed response");
            }
        }
        Some(Transition::Failing(ErrorKind::Unauthorized)) => {
            warn!(%source, %category, "credentials rejected, check the configured username and password");
        }
        Some(Transition::Failing(ErrorKind::Connectivity)) => {
            if let Some(failure) = failure {
                warn!(%source, %category, error = %failure, "fetch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::Outcome,
        source::{Source, api::BotApi, test_util::MockApi},
    };
    use url::Url;

    fn remote(name: &str, api: Arc<MockApi>) -> RemoteSource {
        let source = Source::new(
            name.into(),
            Url::parse("http://127.0.0.1:8080/").unwrap(),
            "2024.9".into(),
            serde_json::from_value(serde_json::json!({"timeframe": "5m", "stake_currency": "USDT"}))
                .unwrap(),
        );
        RemoteSource::new(source, api as Arc<dyn BotApi>, Duration::from_secs(10))
    }

    fn scheduler(apis: &[(&str, Arc<MockApi>)], config: SchedulerConfig) -> Scheduler {
        let (sources, failures) = SourceSet::new(
            apis.iter()
                .map(|(name, api)| remote(name, Arc::clone(api))),
        );
        assert!(failures.is_empty());
        Scheduler::new(Arc::new(sources), Arc::new(SnapshotCache::new()), config)
    }

    async fn settle(scheduler: &Scheduler) {
        loop {
            let busy = scheduler.sources().iter().any(|remote| {
                Cadence::ALL.iter().any(|cadence| {
                    scheduler
                        .categories(remote.name(), *cadence)
                        .iter()
                        .any(|category| scheduler.cache().is_fetching(remote.name(), category))
                })
            });
            if !busy {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_transition() {
        struct TestCase {
            before: Option<ErrorKind>,
            after: Option<ErrorKind>,
            expected: Option<Transition>,
        }

        let tests = vec![
            TestCase {
                // TC0: healthy stays healthy
                before: None,
                after: None,
                expected: None,
            },
            TestCase {
                // TC1: healthy to failing
                before: None,
                after: Some(ErrorKind::Connectivity),
                expected: Some(Transition::Failing(ErrorKind::Connectivity)),
            },
            TestCase {
                // TC2: same failure repeated is silent
                before: Some(ErrorKind::Connectivity),
                after: Some(ErrorKind::Connectivity),
                expected: None,
            },
            TestCase {
                // TC3: failure kind changes
                before: Some(ErrorKind::Connectivity),
                after: Some(ErrorKind::Unauthorized),
                expected: Some(Transition::Failing(ErrorKind::Unauthorized)),
            },
            TestCase {
                // TC4: recovery
                before: Some(ErrorKind::MalformedResponse),
                after: None,
                expected: Some(Transition::Recovered(ErrorKind::MalformedResponse)),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = transition(test.before, test.after);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_scheduler_config_from_config() {
        let config = Config::default().with_pool_size(3);
        let actual = SchedulerConfig::from(&config);

        assert_eq!(actual.pool_size, 3);
        assert_eq!(actual.period(Cadence::Fast), Duration::from_secs(1));
        assert_eq!(actual.period(Cadence::Medium), Duration::from_secs(5));
        assert_eq!(actual.period(Cadence::Slow), Duration::from_secs(60));
        assert!(actual.standing.contains(&DataCategory::Logs(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_refresh_coalesces_in_flight_key() {
        let api = Arc::new(MockApi::default());
        *api.delay.lock() = Some(Duration::from_secs(2));
        let scheduler = scheduler(&[("bot1", Arc::clone(&api))], SchedulerConfig::default());
        let bot1 = SourceName::from("bot1");

        assert_eq!(
            scheduler.request_refresh(&bot1, DataCategory::SysInfo),
            RefreshRequest::Spawned
        );
        assert_eq!(
            scheduler.request_refresh(&bot1, DataCategory::SysInfo),
            RefreshRequest::Coalesced
        );
        assert_eq!(
            scheduler.request_refresh(&bot1, DataCategory::Whitelist),
            RefreshRequest::Spawned
        );

        settle(&scheduler).await;
        assert_eq!(*api.calls.lock(), 2);
        let snapshot = scheduler.cache().read(&bot1, &DataCategory::SysInfo).unwrap();
        assert_eq!(snapshot.outcome, Outcome::Ok);

        // Key is idle again
        assert_eq!(
            scheduler.request_refresh(&bot1, DataCategory::SysInfo),
            RefreshRequest::Spawned
        );
        settle(&scheduler).await;
    }

    #[tokio::test]
    async fn test_request_refresh_unknown_and_disabled() {
        let api = Arc::new(MockApi::default());
        let scheduler = scheduler(&[("bot1", api)], SchedulerConfig::default());

        assert_eq!(
            scheduler.request_refresh(&"nope".into(), DataCategory::SysInfo),
            RefreshRequest::UnknownSource
        );

        let bot1 = SourceName::from("bot1");
        scheduler.sources().get(&bot1).unwrap().source().disable();
        assert_eq!(
            scheduler.request_refresh(&bot1, DataCategory::SysInfo),
            RefreshRequest::SourceDisabled
        );
    }

    #[tokio::test]
    async fn test_tick_fans_out_by_cadence_and_skips_disabled() {
        let api1 = Arc::new(MockApi::default());
        let api2 = Arc::new(MockApi::default());
        let config = SchedulerConfig::default().with_standing(vec![
            DataCategory::OpenTrades,
            DataCategory::TradeCount,
            DataCategory::SysInfo,
        ]);
        let scheduler = scheduler(
            &[("bot1", Arc::clone(&api1)), ("bot2", Arc::clone(&api2))],
            config,
        );
        let bot2 = SourceName::from("bot2");

        let report = scheduler.tick(Cadence::Fast);
        assert_eq!(
            report,
            TickReport {
                spawned: 4,
                coalesced: 0,
                skipped: 0
            }
        );
        settle(&scheduler).await;
        assert!(scheduler.cache().read(&bot2, &DataCategory::OpenTrades).is_some());
        assert!(scheduler.cache().read(&bot2, &DataCategory::SysInfo).is_none());

        scheduler.sources().get(&bot2).unwrap().source().disable();
        let calls_before = *api2.calls.lock();
        let report = scheduler.tick(Cadence::Fast);
        assert_eq!(report.spawned, 2);
        assert_eq!(report.skipped, 1);
        settle(&scheduler).await;

        assert_eq!(*api2.calls.lock(), calls_before);
        // Last snapshot of a disabled source stays readable
        assert!(scheduler.cache().read(&bot2, &DataCategory::OpenTrades).is_some());
    }

    #[tokio::test]
    async fn test_watched_categories_join_fan_out() {
        let api = Arc::new(MockApi::default());
        let scheduler = scheduler(
            &[("bot1", Arc::clone(&api))],
            SchedulerConfig::default().with_standing(vec![]),
        );
        let bot1 = SourceName::from("bot1");
        let candles = DataCategory::Candles(crate::category::CandleKey::new(
            "BTC/USDT".into(),
            "5m".into(),
            1,
        ));

        assert!(scheduler.watch(&bot1, candles.clone()));
        assert!(!scheduler.watch(&bot1, candles.clone()));
        assert_eq!(scheduler.tick(Cadence::Fast).spawned, 0);
        assert_eq!(scheduler.tick(Cadence::Slow).spawned, 1);
        settle(&scheduler).await;

        let snapshot = scheduler.cache().read(&bot1, &candles).unwrap();
        assert_eq!(snapshot.payload().map(|payload| payload.len()), Some(1));

        assert!(scheduler.unwatch(&bot1, &candles));
        assert!(scheduler.watched(&bot1).is_empty());
        assert_eq!(scheduler.tick(Cadence::Slow).spawned, 0);
    }

    #[tokio::test]
    async fn test_unauthorized_is_recorded_and_retried() {
        let api = Arc::new(MockApi::default());
        *api.fail_with.lock() = Some(FetchError::Unauthorized);
        let scheduler = scheduler(
            &[("bot2", Arc::clone(&api))],
            SchedulerConfig::default().with_standing(vec![DataCategory::OpenTrades]),
        );
        let bot2 = SourceName::from("bot2");

        for round in 1..=3 {
            assert_eq!(scheduler.tick(Cadence::Fast).spawned, 1);
            settle(&scheduler).await;
            assert_eq!(*api.calls.lock(), round);
        }

        let snapshot = scheduler.cache().read(&bot2, &DataCategory::OpenTrades).unwrap();
        assert_eq!(snapshot.outcome, Outcome::Error(FetchError::Unauthorized));
        assert!(snapshot.payload().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_size_bounds_concurrent_fetches() {
        let api = Arc::new(MockApi::default());
        *api.delay.lock() = Some(Duration::from_secs(5));
        let scheduler = scheduler(
            &[("bot1", Arc::clone(&api))],
            SchedulerConfig::default()
                .with_pool_size(1)
                .with_standing(vec![DataCategory::SysInfo, DataCategory::Performance]),
        );

        assert_eq!(scheduler.tick(Cadence::Medium).spawned, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*api.calls.lock(), 1);

        settle(&scheduler).await;
        assert_eq!(*api.calls.lock(), 2);
    }
}
