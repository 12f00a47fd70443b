use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serenity::async_trait;
use thiserror::Error;

use super::{ActorKey, ScopeId, Verdict};

/// Outbound moderation interface (the platform's ban endpoint).
#[async_trait]
pub trait ModerationActions: Send + Sync {
    /// Ban `actor` in `scope`. Calling it for an already banned actor is allowed;
    /// the platform may answer with an error, which is reported as a failure.
    async fn ban(&self, scope: ScopeId, actor: ActorKey, reason: &str) -> Result<(), SanctionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanctionError {
    #[error("moderation call timed out after {0:?}")]
    Timeout(Duration),
    #[error("platform refused sanction: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanctionOutcome {
    Applied,
    Suppressed,
    Failed(SanctionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanctionState {
    /// Claimed, external call not finished yet.
    InProgress,
    Sanctioned,
}

/// Stored state plus the id of the claim that created it.
#[derive(Debug, Clone, Copy)]
struct Slot {
    state: SanctionState,
    claim: u64,
}

/// Turns triggering verdicts into at most one ban per actor and guild.
///
/// The claim is taken by inserting [`SanctionState::InProgress`] into a vacant
/// map entry, which happens under the shard lock, so of two concurrent
/// verdicts for the same actor exactly one proceeds to the platform call.
/// Each claim carries its own id; a finishing call only promotes or releases
/// the slot while that id is still stored, so a call that outlived a `reset`
/// cannot touch the claim taken after it.
pub struct SanctionExecutor {
    moderation: Arc<dyn ModerationActions>,
    states: DashMap<(ScopeId, ActorKey), Slot>,
    next_claim: AtomicU64,
    timeout: Duration,
}

impl SanctionExecutor {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(moderation: Arc<dyn ModerationActions>, timeout: Duration) -> Self {
        Self {
            moderation,
            states: DashMap::new(),
            next_claim: AtomicU64::new(1),
            timeout,
        }
    }

    /// `None` for non-triggered verdicts, otherwise what happened to the sanction.
    pub async fn maybe_sanction(&self, scope: ScopeId, verdict: &Verdict) -> Option<SanctionOutcome> {
        if !verdict.triggered {
            return None;
        }
        let key = (scope, verdict.actor);

        let Some(claim) = self.claim(key) else {
            return Some(SanctionOutcome::Suppressed);
        };

        let reason = verdict.action_type.sanction_reason();
        let result = match tokio::time::timeout(
            self.timeout,
            self.moderation.ban(scope, verdict.actor, reason),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(SanctionError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                // reset() w trakcie wywołania wygrywa – nie przywracamy wpisu,
                // a cudzego claima (po resecie) nie ruszamy
                if let Some(mut slot) = self.states.get_mut(&key) {
                    if slot.claim == claim {
                        slot.state = SanctionState::Sanctioned;
                    }
                }
                Some(SanctionOutcome::Applied)
            }
            Err(cause) => {
                self.states.remove_if(&key, |_, slot| {
                    slot.claim == claim && slot.state == SanctionState::InProgress
                });
                Some(SanctionOutcome::Failed(cause))
            }
        }
    }

    /// Mark `key` as in progress unless it already has a state.
    /// Returns the id of the new claim.
    fn claim(&self, key: (ScopeId, ActorKey)) -> Option<u64> {
        match self.states.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let claim = self.next_claim.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Slot {
                    state: SanctionState::InProgress,
                    claim,
                });
                Some(claim)
            }
        }
    }

    pub fn state(&self, scope: ScopeId, actor: ActorKey) -> Option<SanctionState> {
        self.states.get(&(scope, actor)).map(|s| s.state)
    }

    /// Forget a sanction (e.g. after an unban). Returns whether anything was cleared.
    pub fn reset(&self, scope: ScopeId, actor: ActorKey) -> bool {
        self.states.remove(&(scope, actor)).is_some()
    }

    /// Actors with a completed sanction; claims still in flight are not counted.
    pub fn sanctioned_count(&self) -> usize {
        self.states
            .iter()
            .filter(|slot| slot.state == SanctionState::Sanctioned)
            .count()
    }
}

impl fmt::Debug for SanctionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanctionExecutor")
            .field("states", &self.states.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
