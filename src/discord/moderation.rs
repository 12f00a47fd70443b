use std::sync::Arc;

use serenity::all::{GuildId, Http, UserId};
use serenity::async_trait;

use crate::antiraid::{ActorKey, ModerationActions, SanctionError, ScopeId};

/// Bany przez REST API Discorda.
pub struct SerenityModeration {
    http: Arc<Http>,
}

impl SerenityModeration {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ModerationActions for SerenityModeration {
    async fn ban(&self, scope: ScopeId, actor: ActorKey, reason: &str) -> Result<(), SanctionError> {
        // GuildId::new / UserId::new panikują na 0
        if scope.0 == 0 || actor.0 == 0 {
            return Err(SanctionError::Platform(format!(
                "invalid id (guild {scope}, user {actor})"
            )));
        }
        GuildId::new(scope.0)
            .ban_with_reason(&self.http, UserId::new(actor.0), 0, reason)
            .await
            .map_err(|e| SanctionError::Platform(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_ids_fail_without_http_call() {
        let m = SerenityModeration::new(Arc::new(Http::new("")));
        let err = m.ban(ScopeId(0), ActorKey(5), "x").await.unwrap_err();
        assert!(matches!(err, SanctionError::Platform(_)));
        let err = m.ban(ScopeId(5), ActorKey(0), "x").await.unwrap_err();
        assert!(matches!(err, SanctionError::Platform(_)));
    }
}
