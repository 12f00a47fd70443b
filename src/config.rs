use std::time::Duration;

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::antiraid::{AbuseDetector, ActionType, RateLimit, SanctionExecutor};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub env: String,
    pub app: App,
    pub discord: Discord,
    pub logging: Logging,
    pub antiraid: AntiRaidConfig,
    pub health: Health,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct App {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Discord {
    pub token: String,
    pub intents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logging {
    pub json: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Health {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct LimitConfig {
    pub threshold: u32,
    pub window_secs: u64,
}

impl LimitConfig {
    pub fn rate_limit(&self) -> RateLimit {
        RateLimit::new(self.threshold, Duration::from_secs(self.window_secs))
    }
}

impl From<RateLimit> for LimitConfig {
    fn from(l: RateLimit) -> Self {
        Self {
            threshold: l.threshold,
            window_secs: l.window.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    pub role_delete: LimitConfig,
    pub channel_delete: LimitConfig,
    pub ban: LimitConfig,
    pub message_send: LimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            role_delete: ActionType::RoleDelete.default_limit().into(),
            channel_delete: ActionType::ChannelDelete.default_limit().into(),
            ban: ActionType::Ban.default_limit().into(),
            message_send: ActionType::MessageSend.default_limit().into(),
        }
    }
}

impl LimitsConfig {
    pub fn get(&self, kind: ActionType) -> &LimitConfig {
        match kind {
            ActionType::RoleDelete => &self.role_delete,
            ActionType::ChannelDelete => &self.channel_delete,
            ActionType::Ban => &self.ban,
            ActionType::MessageSend => &self.message_send,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActionType, RateLimit)> + '_ {
        ActionType::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind).rate_limit()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AntiRaidConfig {
    pub limits: LimitsConfig,
    /// Po tylu sekundach bez zdarzeń log aktora jest usuwany z pamięci.
    pub idle_ttl_secs: u64,
    pub prune_interval_secs: u64,
    pub sanction_timeout_ms: u64,
    /// Kanał na embed z każdą próbą bana; brak => tylko logi.
    pub log_channel_id: Option<u64>,
}

impl Default for AntiRaidConfig {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            idle_ttl_secs: AbuseDetector::DEFAULT_IDLE_TTL.as_secs(),
            prune_interval_secs: 60,
            sanction_timeout_ms: SanctionExecutor::DEFAULT_TIMEOUT.as_millis() as u64,
            log_channel_id: None,
        }
    }
}

impl AntiRaidConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        // interval(0) panikuje w tokio
        Duration::from_secs(self.prune_interval_secs.max(1))
    }

    pub fn sanction_timeout(&self) -> Duration {
        Duration::from_millis(self.sanction_timeout_ms)
    }
}

impl Settings {
    /// Wartości domyślne dla danego środowiska.
    pub fn defaults(env: &str) -> Self {
        Self {
            env: env.to_string(),
            app: App {
                name: "Fusion Guard".into(),
            },
            discord: Discord {
                token: "".into(),
                intents: vec![
                    "GUILDS".into(),
                    "GUILD_MEMBERS".into(),
                    "GUILD_MODERATION".into(),
                    "GUILD_MESSAGES".into(),
                    "MESSAGE_CONTENT".into(),
                ],
            },
            logging: Logging {
                json: Some(false),
                level: Some("info".into()),
            },
            antiraid: AntiRaidConfig::default(),
            health: Health {
                enabled: true,
                bind: "0.0.0.0".into(),
                port: 8080,
            },
        }
    }

    /// Warstwy: domyślne -> plik TOML -> zmienne środowiskowe FG_* -> DISCORD_TOKEN / PORT
    pub fn figment(env: &str) -> Figment {
        Figment::from(Serialized::defaults(Self::defaults(env)))
            .merge(Toml::file(format!("config/{}.toml", env)))
            // FG_ANTIRAID__LIMITS__BAN__THRESHOLD => antiraid.limits.ban.threshold
            .merge(Env::prefixed("FG_").ignore(&["ENV"]).split("__"))
            // gołe zmienne ustawiane przez hosting (Replit, Render itp.)
            .merge(Env::raw().only(&["DISCORD_TOKEN"]).map(|_| "discord.token".into()))
            .merge(Env::raw().only(&["PORT"]).map(|_| "health.port".into()))
    }

    pub fn load() -> Result<Self> {
        // Które środowisko?
        let env = std::env::var("FG_ENV").unwrap_or_else(|_| "development".to_string());

        // Załaduj .env.<env> i .env (jeśli są)
        let _ = dotenvy::from_filename(format!(".env.{}", env));
        let _ = dotenvy::dotenv();

        let mut s: Settings = Self::figment(&env).extract()?;
        s.env = env;
        Ok(s)
    }
}
