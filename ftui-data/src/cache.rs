//! Shared snapshot cache.
//!
//! Two-level map `SourceName -> DataCategory -> Slot`. Each [`Slot`] holds the latest
//! [`Snapshot`] behind its own lock, so writes to different keys never contend and readers
//! only wait for a write to the key they are reading. A write swaps in a new `Arc`; readers
//! holding the previous `Arc` keep a complete, immutable value.
//!
//! The slot also carries the per-key in-flight flag used by the scheduler to guarantee at
//! most one outstanding fetch per key.

use crate::{
    category::DataCategory,
    error::{ErrorKind, FetchError},
    payload::Payload,
    source::SourceName,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Result of the fetch that produced a [`Snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok,
    Error(FetchError),
}

impl Outcome {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Ok => None,
            Outcome::Error(error) => Some(error.kind()),
        }
    }
}

/// Immutable result of the most recent fetch for one (source, category) key.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub source: SourceName,
    pub category: DataCategory,
    pub started_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    /// Last known good rows. Carried forward when a later fetch fails.
    pub payload: Option<Arc<Payload>>,
    pub outcome: Outcome,
    pub last_success: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok)
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.outcome {
            Outcome::Ok => None,
            Outcome::Error(error) => Some(error),
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_deref()
    }

    /// Failed refresh with earlier data still available.
    pub fn is_stale(&self) -> bool {
        !self.is_ok() && self.payload.is_some()
    }
}

/// Result of [`SnapshotCache::write`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Stored; carries the snapshot it replaced, if any.
    Stored { previous: Option<Arc<Snapshot>> },
    /// Rejected because the stored snapshot came from a fetch that started later.
    Superseded,
}

/// Aggregate state of every cached key for one source.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SourceHealth {
    Unknown,
    Healthy,
    Degraded { failing: usize, kind: ErrorKind },
    Unauthorized,
}

#[derive(Debug, Default)]
struct Slot {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    in_flight: AtomicBool,
}

type CategorySlots = RwLock<FnvHashMap<DataCategory, Arc<Slot>>>;

#[derive(Debug, Default)]
pub struct SnapshotCache {
    sources: RwLock<FnvHashMap<SourceName, Arc<CategorySlots>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, source: &SourceName, category: &DataCategory) -> Option<Arc<Slot>> {
        let categories = Arc::clone(self.sources.read().get(source)?);
        let slot = categories.read().get(category).cloned();
        slot
    }

    fn slot_or_insert(&self, source: &SourceName, category: &DataCategory) -> Arc<Slot> {
        if let Some(slot) = self.slot(source, category) {
            return slot;
        }

        let categories = {
            let mut sources = self.sources.write();
            Arc::clone(sources.entry(source.clone()).or_default())
        };
        let mut categories = categories.write();
        Arc::clone(categories.entry(category.clone()).or_default())
    }

    /// Latest snapshot for the key, or `None` if it was never written.
    pub fn read(&self, source: &SourceName, category: &DataCategory) -> Option<Arc<Snapshot>> {
        self.slot(source, category)?.snapshot.read().clone()
    }

    /// Atomically replace the snapshot for the key with the result of a fetch that started
    /// at `started_at`.
    ///
    /// A failed fetch keeps the previous payload and success time. Results of a fetch that
    /// started before the stored one are discarded.
    pub fn write(
        &self,
        source: &SourceName,
        category: &DataCategory,
        started_at: DateTime<Utc>,
        result: Result<Payload, FetchError>,
    ) -> WriteOutcome {
        let slot = self.slot_or_insert(source, category);
        let mut current = slot.snapshot.write();

        if current
            .as_ref()
            .is_some_and(|stored| started_at < stored.started_at)
        {
            return WriteOutcome::Superseded;
        }

        let fetched_at = Utc::now();
        let (payload, outcome, last_success) = match result {
            Ok(payload) => (Some(Arc::new(payload)), Outcome::Ok, Some(fetched_at)),
            Err(error) => (
                current.as_ref().and_then(|stored| stored.payload.clone()),
                Outcome::Error(error),
                current.as_ref().and_then(|stored| stored.last_success),
            ),
        };

        let snapshot = Arc::new(Snapshot {
            source: source.clone(),
            category: category.clone(),
            started_at,
            fetched_at,
            payload,
            outcome,
            last_success,
        });

        WriteOutcome::Stored {
            previous: current.replace(snapshot),
        }
    }

    /// Claim the in-flight flag for the key. Returns `None` if a fetch is already running.
    pub fn try_begin(&self, source: &SourceName, category: &DataCategory) -> Option<FetchTicket> {
        let slot = self.slot_or_insert(source, category);
        slot.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(FetchTicket {
            slot,
            source: source.clone(),
            category: category.clone(),
        })
    }

    pub fn is_fetching(&self, source: &SourceName, category: &DataCategory) -> bool {
        self.slot(source, category)
            .is_some_and(|slot| slot.in_flight.load(Ordering::Acquire))
    }

    /// Every populated snapshot of one source.
    pub fn snapshots(&self, source: &SourceName) -> Vec<Arc<Snapshot>> {
        let Some(categories) = self.sources.read().get(source).cloned() else {
            return Vec::new();
        };
        let slots: Vec<Arc<Slot>> = categories.read().values().cloned().collect();
        slots
            .iter()
            .filter_map(|slot| slot.snapshot.read().clone())
            .collect()
    }

    pub fn source_health(&self, source: &SourceName) -> SourceHealth {
        let snapshots = self.snapshots(source);
        if snapshots.is_empty() {
            return SourceHealth::Unknown;
        }

        let kinds: Vec<ErrorKind> = snapshots
            .iter()
            .filter_map(|snapshot| snapshot.outcome.error_kind())
            .collect();

        match kinds.iter().copied().max_by_key(|kind| kind.severity()) {
            Some(ErrorKind::Unauthorized) => SourceHealth::Unauthorized,
            Some(kind) => SourceHealth::Degraded {
                failing: kinds.len(),
                kind,
            },
            None => SourceHealth::Healthy,
        }
    }
}

/// Exclusive right to fetch one key. Dropping the ticket releases the in-flight flag.
#[derive(Debug)]
pub struct FetchTicket {
    slot: Arc<Slot>,
    source: SourceName,
    category: DataCategory,
}

impl FetchTicket {
    pub fn source(&self) -> &SourceName {
        &self.source
    }

    pub fn category(&self) -> &DataCategory {
        &self.category
    }

    /// Store the fetch result and release the key.
    pub fn complete(
        self,
        cache: &SnapshotCache,
        started_at: DateTime<Utc>,
        result: Result<Payload, FetchError>,
    ) -> WriteOutcome {
        cache.write(&self.source, &self.category, started_at, result)
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.slot.in_flight.store(false, Ordering::Release);
    }
}
