use crate::{
    category::{CandleKey, DataCategory},
    model::Candle,
    scheduler::{RefreshRequest, Scheduler},
    source::SourceName,
    view::panel::PanelState,
};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use std::collections::VecDeque;

/// Fixed-length window of the most recent candles, ordered by open time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartBuffer {
    bars: VecDeque<Candle>,
    capacity: usize,
}

impl ChartBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.bars.back().map(|bar| bar.time)
    }

    pub fn bars(&self) -> impl DoubleEndedIterator<Item = &Candle> + ExactSizeIterator {
        self.bars.iter()
    }

    pub fn reset(&mut self) {
        self.bars.clear();
    }

    /// Merge a fetched window, returning the number of bars appended.
    ///
    /// An empty buffer takes the newest `capacity` bars. Otherwise only bars strictly newer
    /// than the last buffered bar are appended, dropping the oldest to keep the length.
    pub fn merge(&mut self, candles: &[Candle]) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        let skip = if self.bars.is_empty() {
            candles.len().saturating_sub(self.capacity)
        } else {
            0
        };

        let mut appended = 0;
        for candle in &candles[skip..] {
            if self.last_time().is_some_and(|last| candle.time <= last) {
                continue;
            }
            if self.bars.len() >= self.capacity {
                self.bars.pop_front();
            }
            self.bars.push_back(candle.clone());
            appended += 1;
        }
        appended
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Phase {
    Full,
    Tail,
}

/// Candle chart of one pair on one source.
///
/// Starts with a full-window fetch, then follows the series with single-bar tail fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    source: SourceName,
    key: CandleKey,
    buffer: ChartBuffer,
    phase: Phase,
    merged_at: Option<DateTime<Utc>>,
    /// Snapshots fetched at or before this time predate the last manual refresh.
    reset_at: Option<DateTime<Utc>>,
}

impl ChartView {
    pub fn new(source: SourceName, pair: SmolStr, timeframe: SmolStr, bars: u32) -> Self {
        Self {
            source,
            key: CandleKey::new(pair, timeframe, bars),
            buffer: ChartBuffer::new(bars as usize),
            phase: Phase::Full,
            merged_at: None,
            reset_at: None,
        }
    }

    pub fn source(&self) -> &SourceName {
        &self.source
    }

    pub fn pair(&self) -> &str {
        &self.key.pair
    }

    pub fn timeframe(&self) -> &str {
        &self.key.timeframe
    }

    pub fn buffer(&self) -> &ChartBuffer {
        &self.buffer
    }

    pub fn is_following_tail(&self) -> bool {
        self.phase == Phase::Tail
    }

    /// Cache key currently feeding the buffer.
    pub fn category(&self) -> DataCategory {
        match self.phase {
            Phase::Full => DataCategory::Candles(self.key.clone()),
            Phase::Tail => DataCategory::Candles(self.key.with_limit(1)),
        }
    }

    pub fn state(&self, scheduler: &Scheduler) -> PanelState {
        PanelState::read(scheduler.cache(), &self.source, &self.category())
    }

    /// Start refreshing the active key with the slow cadence.
    ///
    /// While waiting for the full window, any snapshot already cached under the full key
    /// predates this view and is skipped by [`Self::pull`] until a newer fetch lands.
    pub fn attach(&mut self, scheduler: &Scheduler) -> RefreshRequest {
        let category = self.category();
        if self.phase == Phase::Full {
            if let Some(snapshot) = scheduler.cache().read(&self.source, &category) {
                self.reset_at = Some(snapshot.fetched_at);
            }
        }
        scheduler.watch(&self.source, category.clone());
        scheduler.request_refresh(&self.source, category)
    }

    pub fn detach(&self, scheduler: &Scheduler) {
        scheduler.unwatch(&self.source, &DataCategory::Candles(self.key.clone()));
        scheduler.unwatch(&self.source, &DataCategory::Candles(self.key.with_limit(1)));
    }

    /// Merge the latest successful snapshot of the active key, if not merged already.
    /// Returns whether the buffer changed.
    pub fn pull(&mut self, scheduler: &Scheduler) -> bool {
        let Some(snapshot) = scheduler.cache().read(&self.source, &self.category()) else {
            return false;
        };
        if !snapshot.is_ok()
            || self.merged_at.is_some_and(|merged| snapshot.fetched_at <= merged)
            || self.reset_at.is_some_and(|reset| snapshot.fetched_at <= reset)
        {
            return false;
        }
        let Some(candles) = snapshot.payload().and_then(|payload| payload.candles()) else {
            return false;
        };

        let appended = self.buffer.merge(candles);
        self.merged_at = Some(snapshot.fetched_at);

        if self.phase == Phase::Full {
            self.detach(scheduler);
            self.phase = Phase::Tail;
            self.attach(scheduler);
        }

        appended > 0
    }

    /// Drop the buffer and force a fresh full-window fetch.
    pub fn refresh_now(&mut self, scheduler: &Scheduler) -> RefreshRequest {
        self.detach(scheduler);
        self.buffer.reset();
        self.phase = Phase::Full;
        self.merged_at = None;
        self.reset_at = None;
        self.attach(scheduler)
    }
}
