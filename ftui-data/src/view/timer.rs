use crate::category::Cadence;
use indexmap::IndexMap;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq)]
struct Timer {
    period: Duration,
    next_due: Instant,
}

/// Visibility-scoped group of re-read timers owned by one view.
///
/// While suspended nothing fires. Registering a cadence or resuming makes every timer due
/// immediately so a newly visible view reads the cache straight away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerGroup {
    timers: IndexMap<Cadence, Timer>,
    suspended: bool,
}

impl TimerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cadence: Cadence, period: Duration, now: Instant) {
        self.timers.insert(
            cadence,
            Timer {
                period,
                next_due: now,
            },
        );
    }

    pub fn unregister(&mut self, cadence: Cadence) -> bool {
        self.timers.shift_remove(&cadence).is_some()
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self, now: Instant) {
        self.suspended = false;
        for timer in self.timers.values_mut() {
            timer.next_due = now;
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn cadences(&self) -> impl Iterator<Item = Cadence> + '_ {
        self.timers.keys().copied()
    }

    /// Cadences that fired since the last poll. Each fired timer is re-armed one period
    /// from `now`, so a stalled render loop never produces a burst of catch-up ticks.
    pub fn due(&mut self, now: Instant) -> Vec<Cadence> {
        if self.suspended {
            return Vec::new();
        }

        self.timers
            .iter_mut()
            .filter(|(_, timer)| timer.next_due <= now)
            .map(|(cadence, timer)| {
                timer.next_due = now + timer.period;
                *cadence
            })
            .collect()
    }

    /// Time until the next timer fires, for sizing the event poll timeout.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        if self.suspended {
            return None;
        }
        self.timers
            .values()
            .map(|timer| timer.next_due.saturating_duration_since(now))
            .min()
    }
}
