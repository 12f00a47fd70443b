use crate::config::Settings;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Inicjalizacja logowania.
/// RUST_LOG ma pierwszeństwo przed `logging.level`; `logging.json = true` daje JSON.
pub fn init(settings: &Settings) {
    let level = settings
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "info".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);

    // try_init: drugi init (np. w testach) nie panikuje
    let res = if settings.logging.json.unwrap_or(false) {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if let Err(e) = res {
        eprintln!("logging already initialised: {e}");
    }
}
