//! Per-actor sliding time windows.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use super::ActorKey;

/// Ordered log of event instants for one (actor, action type) pair.
#[derive(Debug, Default, Clone)]
pub struct TimestampLog {
    entries: VecDeque<DateTime<Utc>>,
}

impl TimestampLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `at` and drop everything strictly older than `newest - window`
    /// (`newest` is `at` unless the event arrived late).
    /// Returns the number of entries left in the window.
    pub fn record(&mut self, at: DateTime<Utc>, window: Duration) -> usize {
        // Ogon musi zostać posortowany nawet przy lekko spóźnionym evencie.
        match self.entries.back() {
            Some(&last) if at < last => {
                let pos = self.entries.partition_point(|t| *t <= at);
                self.entries.insert(pos, at);
            }
            _ => self.entries.push_back(at),
        }
        let newest = self.entries.back().copied().unwrap_or(at);
        self.trim(cutoff(newest, window));
        self.entries.len()
    }

    /// Remove head entries with `entry < cutoff`. An entry equal to the cutoff stays.
    pub fn trim(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some(&front) = self.entries.front() {
            if front < cutoff {
                self.entries.pop_front();
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.front().copied()
    }

    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.entries.back().copied()
    }
}

/// Trailing-window event counter for a single action type.
///
/// Each actor owns its own [`TimestampLog`]; `record` mutates it under the
/// DashMap shard lock, so updates for one actor are serialized while other
/// actors proceed on other shards.
#[derive(Debug)]
pub struct SlidingWindowCounter {
    window: Duration,
    logs: DashMap<ActorKey, TimestampLog>,
}

impl SlidingWindowCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            logs: DashMap::new(),
        }
    }

    /// Append an event for `actor` and return its in-window count.
    pub fn record(&self, actor: ActorKey, at: DateTime<Utc>) -> usize {
        let mut log = self.logs.entry(actor).or_default();
        log.record(at, self.window)
    }

    /// Current log length for `actor` (0 if never seen or evicted).
    pub fn count(&self, actor: ActorKey) -> usize {
        self.logs.get(&actor).map(|l| l.len()).unwrap_or(0)
    }

    pub fn oldest(&self, actor: ActorKey) -> Option<DateTime<Utc>> {
        self.logs.get(&actor).and_then(|l| l.oldest())
    }

    pub fn newest(&self, actor: ActorKey) -> Option<DateTime<Utc>> {
        self.logs.get(&actor).and_then(|l| l.newest())
    }

    /// Number of actors with a live log.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Drop logs whose newest entry is older than `now - idle_ttl`.
    ///
    /// `idle_ttl` below the window is raised to the window, so an evicted log
    /// could not have contributed to any future count anyway.
    pub fn prune_idle(&self, now: DateTime<Utc>, idle_ttl: Duration) -> usize {
        let cutoff = cutoff(now, idle_ttl.max(self.window));
        let before = self.logs.len();
        self.logs
            .retain(|_, log| log.newest().is_some_and(|newest| newest >= cutoff));
        before.saturating_sub(self.logs.len())
    }
}

/// `at - window`, saturating at the earliest representable instant.
pub(crate) fn cutoff(at: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|d| at.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
