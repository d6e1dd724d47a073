mod config;
mod overdue;
mod state;
mod web;

use anyhow::Result;
use std::{env, sync::Arc, time::Duration};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state::SystemState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempwatch_hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let sweep_every_s: u64 = env::var("SWEEP_INTERVAL_SEC")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s| *s > 0)
        .unwrap_or(60);

    // ── Config file (units + bands) ─────────────────────────────────
    let cfg = config::load(&config_path)?;
    let mut system = SystemState::new();
    config::apply(&cfg, &mut system, OffsetDateTime::now_utc())?;

    if system.units.is_empty() {
        warn!(path = %config_path, "no units configured");
    }
    system.record_system(format!("hub started with {} unit(s)", system.units.len()));

    // ── Shared state ────────────────────────────────────────────────
    let shared = Arc::new(RwLock::new(system));

    // ── Overdue sweep ───────────────────────────────────────────────
    tokio::spawn(overdue::run(
        Arc::clone(&shared),
        Duration::from_secs(sweep_every_s),
    ));

    // ── Web server ──────────────────────────────────────────────────
    info!(config = %config_path, sweep_sec = sweep_every_s, "hub ready");
    web::serve(shared).await
}
