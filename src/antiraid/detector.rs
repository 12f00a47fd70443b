use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use super::window::SlidingWindowCounter;
use super::{ActionType, ActorKey, AntiRaidError, Verdict};
use crate::config::AntiRaidConfig;

/// Threshold/window pair for one action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub threshold: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(threshold: u32, window: Duration) -> Self {
        Self { threshold, window }
    }

    fn validate(self, action_type: ActionType) -> Result<Self, AntiRaidError> {
        if self.threshold == 0 {
            return Err(AntiRaidError::InvalidLimit {
                action_type,
                reason: "threshold must be at least 1",
            });
        }
        if self.window.is_zero() {
            return Err(AntiRaidError::InvalidLimit {
                action_type,
                reason: "window must be longer than zero",
            });
        }
        Ok(self)
    }
}

impl ActionType {
    /// Built-in limits: destructive actions get tight windows and low counts,
    /// chat gets more room.
    pub const fn default_limit(self) -> RateLimit {
        match self {
            ActionType::RoleDelete => RateLimit::new(6, Duration::from_secs(30)),
            ActionType::ChannelDelete => RateLimit::new(3, Duration::from_secs(5)),
            ActionType::Ban => RateLimit::new(3, Duration::from_secs(5)),
            ActionType::MessageSend => RateLimit::new(15, Duration::from_secs(7)),
        }
    }
}

#[derive(Debug)]
struct Monitor {
    limit: RateLimit,
    counter: SlidingWindowCounter,
}

impl Monitor {
    fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            counter: SlidingWindowCounter::new(limit.window),
        }
    }
}

/// Routes events to the per-action-type counters and turns counts into verdicts.
///
/// Every action type owns a separate counter table, so different types never
/// share a lock. Limits are fixed once the detector is built.
#[derive(Debug)]
pub struct AbuseDetector {
    monitors: HashMap<ActionType, Monitor>,
    idle_ttl: Duration,
}

impl AbuseDetector {
    pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(600);

    pub fn new(
        limits: impl IntoIterator<Item = (ActionType, RateLimit)>,
    ) -> Result<Self, AntiRaidError> {
        let mut monitors = HashMap::new();
        for (kind, limit) in limits {
            monitors.insert(kind, Monitor::new(limit.validate(kind)?));
        }
        Ok(Self {
            monitors,
            idle_ttl: Self::DEFAULT_IDLE_TTL,
        })
    }

    /// Detector with the built-in limits for all four action types.
    pub fn with_defaults() -> Self {
        let monitors = ActionType::ALL
            .into_iter()
            .map(|kind| (kind, Monitor::new(kind.default_limit())))
            .collect();
        Self {
            monitors,
            idle_ttl: Self::DEFAULT_IDLE_TTL,
        }
    }

    pub fn from_config(cfg: &AntiRaidConfig) -> Result<Self, AntiRaidError> {
        Ok(Self::new(cfg.limits.iter())?.with_idle_ttl(cfg.idle_ttl()))
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn limit(&self, kind: ActionType) -> Option<RateLimit> {
        self.monitors.get(&kind).map(|m| m.limit)
    }

    /// Record one event and decide whether the actor reached the threshold.
    pub fn record(&self, actor: ActorKey, kind: ActionType, at: DateTime<Utc>) -> Verdict {
        let Some(monitor) = self.monitors.get(&kind) else {
            debug_assert!(false, "no rate limit configured for {kind}");
            tracing::error!(%actor, action = %kind, "no rate limit configured, event ignored");
            return Verdict {
                triggered: false,
                action_type: kind,
                actor,
                count: 0,
                threshold: 0,
            };
        };

        let count = monitor.counter.record(actor, at);
        Verdict {
            triggered: count >= monitor.limit.threshold as usize,
            action_type: kind,
            actor,
            count,
            threshold: monitor.limit.threshold,
        }
    }

    /// In-window count currently held for `actor`.
    pub fn count(&self, actor: ActorKey, kind: ActionType) -> usize {
        self.monitors
            .get(&kind)
            .map(|m| m.counter.count(actor))
            .unwrap_or(0)
    }

    pub fn counter(&self, kind: ActionType) -> Option<&SlidingWindowCounter> {
        self.monitors.get(&kind).map(|m| &m.counter)
    }

    /// Number of live (actor, action type) logs across all tables.
    pub fn tracked(&self) -> usize {
        self.monitors.values().map(|m| m.counter.len()).sum()
    }

    /// Evict logs idle for longer than the configured TTL.
    pub fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        self.monitors
            .values()
            .map(|m| m.counter.prune_idle(now, self.idle_ttl))
            .sum()
    }

    /// Background eviction on a fixed interval. Stops once the detector is dropped.
    ///
    /// "Now" is the wall clock at spawn plus the time elapsed on the tokio
    /// clock, so the task follows a paused runtime clock.
    pub fn spawn_prune_task(this: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(this);
        let (wall, started) = (Utc::now(), tokio::time::Instant::now());
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Some(strong) = weak.upgrade() {
                    let elapsed = TimeDelta::from_std(started.elapsed()).unwrap_or(TimeDelta::MAX);
                    let now = wall.checked_add_signed(elapsed).unwrap_or(DateTime::<Utc>::MAX_UTC);
                    let removed = strong.prune_idle(now);
                    if removed > 0 {
                        tracing::debug!(removed, left = strong.tracked(), "anti-raid idle logs evicted");
                    }
                } else {
                    break;
                }
            }
        })
    }
}
