// Wspólne helpery testów integracyjnych.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serenity::async_trait;

use fusion_guard::antiraid::{ActorKey, ModerationActions, SanctionError, ScopeId};

/// Stały punkt startowy + przesunięcie w ms.
pub fn t(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
}

/// Mock moderacji: zapisuje wywołania, opcjonalnie oblewa pierwsze N i/lub czeka.
#[derive(Default)]
pub struct RecordingModeration {
    calls: Mutex<Vec<(ScopeId, ActorKey, String)>>,
    failures_left: AtomicUsize,
    delay: Duration,
}

impl RecordingModeration {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(ScopeId, ActorKey, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModerationActions for RecordingModeration {
    async fn ban(&self, scope: ScopeId, actor: ActorKey, reason: &str) -> Result<(), SanctionError> {
        self.calls
            .lock()
            .unwrap()
            .push((scope, actor, reason.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SanctionError::Platform("Missing Permissions".into()));
        }
        Ok(())
    }
}
