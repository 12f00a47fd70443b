use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AntiRaidConfig;

pub mod detector;
pub mod sanction;
pub mod window;

pub use detector::{AbuseDetector, RateLimit};
pub use sanction::{
    ModerationActions, SanctionError, SanctionExecutor, SanctionOutcome, SanctionState,
};
pub use window::{SlidingWindowCounter, TimestampLog};

/// Types of actions monitored by the anti-raid service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RoleDelete,
    ChannelDelete,
    Ban,
    MessageSend,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::RoleDelete,
        ActionType::ChannelDelete,
        ActionType::Ban,
        ActionType::MessageSend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::RoleDelete => "role_delete",
            ActionType::ChannelDelete => "channel_delete",
            ActionType::Ban => "ban",
            ActionType::MessageSend => "message_send",
        }
    }

    /// Audit-log reason attached to a sanction triggered by this action type.
    pub fn sanction_reason(self) -> &'static str {
        match self {
            ActionType::RoleDelete => "mass role deletion",
            ActionType::ChannelDelete => "mass channel deletion",
            ActionType::Ban => "rapid multi-ban",
            ActionType::MessageSend => "message flood",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform user id of the account responsible for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ActorKey(pub u64);

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Guild in which an action happened and a sanction applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observed platform action, as delivered by the event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEvent {
    pub actor: ActorKey,
    pub action_type: ActionType,
    pub at: DateTime<Utc>,
    pub scope: ScopeId,
}

/// Per-event determination of whether the actor reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub triggered: bool,
    pub action_type: ActionType,
    pub actor: ActorKey,
    pub count: usize,
    pub threshold: u32,
}

/// Attempted sanction attached to an [`EventReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanctionReport {
    pub outcome: SanctionOutcome,
    pub reason: &'static str,
}

/// Observability record emitted for every processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    pub scope: ScopeId,
    pub verdict: Verdict,
    pub sanction: Option<SanctionReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AntiRaidError {
    #[error("invalid rate limit for {action_type}: {reason}")]
    InvalidLimit {
        action_type: ActionType,
        reason: &'static str,
    },
}

/// Anti-raid service: detection plus sanctioning for one bot process.
pub struct AntiRaid {
    detector: Arc<AbuseDetector>,
    executor: SanctionExecutor,
}

impl AntiRaid {
    pub fn new(detector: Arc<AbuseDetector>, executor: SanctionExecutor) -> Arc<Self> {
        Arc::new(Self { detector, executor })
    }

    pub fn from_config(
        cfg: &AntiRaidConfig,
        moderation: Arc<dyn ModerationActions>,
    ) -> Result<Arc<Self>, AntiRaidError> {
        let detector = Arc::new(AbuseDetector::from_config(cfg)?);
        let executor = SanctionExecutor::new(moderation, cfg.sanction_timeout());
        Ok(Self::new(detector, executor))
    }

    pub fn detector(&self) -> &Arc<AbuseDetector> {
        &self.detector
    }

    pub fn executor(&self) -> &SanctionExecutor {
        &self.executor
    }

    /// Record the event, sanction the actor if the verdict triggers, and
    /// report what happened. Failures end up in the report, never as errors.
    pub async fn handle(&self, event: ActionEvent) -> EventReport {
        let verdict = self
            .detector
            .record(event.actor, event.action_type, event.at);

        tracing::debug!(
            scope = %event.scope,
            actor = %verdict.actor,
            action = %verdict.action_type,
            count = verdict.count,
            threshold = verdict.threshold,
            triggered = verdict.triggered,
            "anti-raid event recorded"
        );

        let sanction = match self.executor.maybe_sanction(event.scope, &verdict).await {
            Some(outcome) => {
                let reason = verdict.action_type.sanction_reason();
                match &outcome {
                    SanctionOutcome::Applied => tracing::warn!(
                        scope = %event.scope,
                        actor = %verdict.actor,
                        action = %verdict.action_type,
                        count = verdict.count,
                        %reason,
                        "anti-raid sanction applied"
                    ),
                    SanctionOutcome::Suppressed => tracing::debug!(
                        scope = %event.scope,
                        actor = %verdict.actor,
                        action = %verdict.action_type,
                        "anti-raid sanction suppressed (already sanctioned or in flight)"
                    ),
                    SanctionOutcome::Failed(cause) => tracing::warn!(
                        scope = %event.scope,
                        actor = %verdict.actor,
                        action = %verdict.action_type,
                        error = %cause,
                        %reason,
                        "anti-raid sanction failed"
                    ),
                }
                Some(SanctionReport { outcome, reason })
            }
            None => None,
        };

        EventReport {
            scope: event.scope,
            verdict,
            sanction,
        }
    }
}

impl fmt::Debug for AntiRaid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AntiRaid")
            .field("detector", &self.detector)
            .field("executor", &self.executor)
            .finish()
    }
}
