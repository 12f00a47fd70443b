// src/discord/mod.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::OnceCell;

use serenity::all::*;
use serenity::async_trait;
use serenity::model::guild::audit_log::{
    Action as AuditAction, ChannelAction, MemberAction, RoleAction,
};

use crate::AppContext;
use crate::antiraid::{ActionEvent, ActionType, ActorKey, AntiRaid, ScopeId};
use crate::modlog::ModLog;

pub mod moderation;

pub use moderation::SerenityModeration;

impl From<UserId> for ActorKey {
    fn from(id: UserId) -> Self {
        ActorKey(id.get())
    }
}

impl From<GuildId> for ScopeId {
    fn from(id: GuildId) -> Self {
        ScopeId(id.get())
    }
}

/// Zdarzenia z gatewaya -> AntiRaid.
pub struct Handler {
    pub app: Arc<AppContext>,
    pub antiraid: Arc<AntiRaid>,
    bot_id: OnceCell<UserId>,
}

impl Handler {
    pub fn new(app: Arc<AppContext>) -> Self {
        let antiraid = app.antiraid();
        Self {
            app,
            antiraid,
            bot_id: OnceCell::new(),
        }
    }

    /// Przepuszcza event przez detektor; przy próbie sankcji wrzuca wpis na kanał logów.
    async fn route(&self, ctx: &Context, event: ActionEvent) {
        if is_own_action(self.bot_id.get().copied(), event.actor) {
            // własne bany bota nie liczą się do limitu Ban
            return;
        }
        let report = self.antiraid.handle(event).await;
        if report.sanction.is_some() {
            ModLog::post(&ctx.http, &self.app, &report).await;
        }
    }

    /// Sprawca destrukcyjnej akcji wg najnowszego wpisu audit logu (best-effort).
    async fn route_audited(&self, ctx: &Context, guild_id: GuildId, kind: ActionType) {
        let Some(action) = audit_action(kind) else {
            return;
        };
        let actor = match guild_id
            .audit_logs(&ctx.http, Some(action), None, None, Some(1))
            .await
        {
            Ok(logs) => logs.entries.first().map(|e| e.user_id),
            Err(e) => {
                tracing::warn!(error=?e, gid=%guild_id.get(), action=%kind, "audit log lookup failed");
                None
            }
        };
        let Some(actor) = actor else {
            tracing::debug!(gid=%guild_id.get(), action=%kind, "no audit log entry, event dropped");
            return;
        };
        self.route(
            ctx,
            ActionEvent {
                actor: actor.into(),
                action_type: kind,
                at: Utc::now(),
                scope: guild_id.into(),
            },
        )
        .await;
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let _ = self.bot_id.set(ready.user.id);
        tracing::info!(guilds = ready.guilds.len(), "Logged in as {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(gid) = msg.guild_id else {
            return;
        };
        if msg.author.bot {
            return;
        }
        self.route(
            &ctx,
            ActionEvent {
                actor: msg.author.id.into(),
                action_type: ActionType::MessageSend,
                at: Utc::now(),
                scope: gid.into(),
            },
        )
        .await;
    }

    async fn channel_delete(
        &self,
        ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        self.route_audited(&ctx, channel.guild_id, ActionType::ChannelDelete)
            .await;
    }

    async fn guild_role_delete(
        &self,
        ctx: Context,
        guild_id: GuildId,
        _removed_role_id: RoleId,
        _removed_role: Option<Role>,
    ) {
        self.route_audited(&ctx, guild_id, ActionType::RoleDelete).await;
    }

    async fn guild_ban_addition(&self, ctx: Context, guild_id: GuildId, _banned_user: User) {
        self.route_audited(&ctx, guild_id, ActionType::Ban).await;
    }

    /// Unban zdejmuje znacznik sankcji – kolejny burst znów może zbanować.
    async fn guild_ban_removal(&self, _ctx: Context, guild_id: GuildId, unbanned_user: User) {
        let cleared = self
            .antiraid
            .executor()
            .reset(guild_id.into(), unbanned_user.id.into());
        if cleared {
            tracing::info!(gid=%guild_id.get(), uid=%unbanned_user.id.get(), "anti-raid sanction state reset after unban");
        }
    }
}

fn audit_action(kind: ActionType) -> Option<AuditAction> {
    match kind {
        ActionType::ChannelDelete => Some(AuditAction::Channel(ChannelAction::Delete)),
        ActionType::RoleDelete => Some(AuditAction::Role(RoleAction::Delete)),
        ActionType::Ban => Some(AuditAction::Member(MemberAction::BanAdd)),
        // wiadomości mają autora w samym evencie
        ActionType::MessageSend => None,
    }
}

fn is_own_action(bot_id: Option<UserId>, actor: ActorKey) -> bool {
    bot_id.is_some_and(|id| id.get() == actor.0)
}

pub fn intents_from_settings(names: &[String]) -> GatewayIntents {
    let mut i = GatewayIntents::empty();
    for n in names {
        match n.as_str() {
            "GUILDS" => i |= GatewayIntents::GUILDS,
            "GUILD_MEMBERS" => i |= GatewayIntents::GUILD_MEMBERS,
            "GUILD_MODERATION" => i |= GatewayIntents::GUILD_MODERATION,
            "GUILD_MESSAGES" => i |= GatewayIntents::GUILD_MESSAGES,
            "MESSAGE_CONTENT" => i |= GatewayIntents::MESSAGE_CONTENT,
            other => tracing::warn!(intent = other, "unknown gateway intent ignored"),
        }
    }
    i
}

pub async fn run_bot(ctx: Arc<AppContext>) -> Result<()> {
    let token = ctx.settings.discord.token.clone();
    if token.is_empty() {
        anyhow::bail!("Brak tokenu Discord (DISCORD_TOKEN / FG_DISCORD__TOKEN). Uzupełnij w .env.");
    }

    let intents = intents_from_settings(&ctx.settings.discord.intents);
    let handler = Handler::new(ctx.clone());

    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    tracing::info!("Discord client starting…");
    client.start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_are_mapped_and_unknown_skipped() {
        let names = vec![
            "GUILDS".to_string(),
            "GUILD_MODERATION".to_string(),
            "NOPE".to_string(),
        ];
        let i = intents_from_settings(&names);
        assert!(i.contains(GatewayIntents::GUILDS | GatewayIntents::GUILD_MODERATION));
        assert!(!i.contains(GatewayIntents::MESSAGE_CONTENT));
    }

    #[test]
    fn audit_action_covers_destructive_types_only() {
        assert!(audit_action(ActionType::MessageSend).is_none());
        for kind in [ActionType::ChannelDelete, ActionType::RoleDelete, ActionType::Ban] {
            assert!(audit_action(kind).is_some());
        }
    }

    #[test]
    fn own_actions_are_skipped() {
        let bot = UserId::new(77);
        assert!(is_own_action(Some(bot), ActorKey(77)));
        assert!(!is_own_action(Some(bot), ActorKey(78)));
        assert!(!is_own_action(None, ActorKey(77)));
    }

    #[test]
    fn ids_convert_to_core_keys() {
        assert_eq!(ActorKey::from(UserId::new(5)), ActorKey(5));
        assert_eq!(ScopeId::from(GuildId::new(6)), ScopeId(6));
    }
}
