use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pairpad_api::{build_router, state::AppState};
use pairpad_config::Settings;
use pairpad_services::{media, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("loading settings")?;

    // Once per process: everything downstream only reads the flag.
    let media = media::detect(&settings.media).await;
    info!(fallback = !media.is_available(), "capability negotiated");

    let room_store = Arc::new(store::RoomStore::new());
    if settings.rooms.reap_interval_secs > 0 {
        store::spawn_reaper(
            room_store.clone(),
            std::time::Duration::from_secs(settings.rooms.reap_interval_secs),
            chrono::Duration::seconds(settings.rooms.reap_grace_secs as i64),
        );
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(room_store, media);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "pairpad-api listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
