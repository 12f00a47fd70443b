// src/lib.rs

pub mod antiraid;
pub mod config;
pub mod discord;
pub mod health;
pub mod logging;
pub mod modlog;

use anyhow::Result;
use std::sync::Arc;

use serenity::all::Http;

use antiraid::{AbuseDetector, AntiRaid};
use config::Settings;
use discord::SerenityModeration;

/// Globalny kontekst aplikacji: konfiguracja + gotowy serwis anti-raid.
pub struct AppContext {
    pub settings: Settings,
    antiraid: Arc<AntiRaid>,
}

impl AppContext {
    /// Bootstrap całej aplikacji:
    /// - logi
    /// - AntiRaid z banami przez REST API Discorda
    /// - sprzątanie bezczynnych logów w tle
    pub async fn bootstrap(settings: Settings) -> Result<Arc<Self>> {
        // 1) logi
        logging::init(&settings);

        // 2) anti-raid (osobny klient HTTP, ten sam token co gateway)
        let http = Arc::new(Http::new(&settings.discord.token));
        let moderation = Arc::new(SerenityModeration::new(http));
        let antiraid = AntiRaid::from_config(&settings.antiraid, moderation)?;

        // 3) eviction
        AbuseDetector::spawn_prune_task(antiraid.detector(), settings.antiraid.prune_interval());

        tracing::info!(
            app = %settings.app.name,
            env = %settings.env,
            limits = ?settings.antiraid.limits,
            "anti-raid ready"
        );

        Ok(Arc::new(Self { settings, antiraid }))
    }

    pub fn antiraid(&self) -> Arc<AntiRaid> {
        self.antiraid.clone()
    }
}

/// Start: endpoint keep-alive w tle + klient Discorda.
pub async fn run(ctx: Arc<AppContext>) -> Result<()> {
    if ctx.settings.health.enabled {
        let addr = health::bind_addr(&ctx.settings.health)?;
        let antiraid = ctx.antiraid();
        tokio::spawn(async move {
            if let Err(e) = health::serve(addr, antiraid).await {
                tracing::error!(error=?e, %addr, "health endpoint stopped");
            }
        });
    }

    discord::run_bot(ctx).await
}
