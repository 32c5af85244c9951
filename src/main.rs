//! newsroom-ingest — Binary Entrypoint
//! Boots the Axum HTTP server, the relevance engine, the ingest pipeline and
//! the process-wide scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsroom_ingest::api::{self, AppState};
use newsroom_ingest::config::Credentials;
use newsroom_ingest::ingest::{config::load_settings_default, scheduler};
use newsroom_ingest::metrics::Metrics;
use newsroom_ingest::relevance::{
    start_hot_reload_thread, KeywordRelevance, RelevanceHandle, DEFAULT_RELEVANCE_CONFIG_PATH,
    ENV_RELEVANCE_CONFIG_PATH,
};
use newsroom_ingest::store::MemoryArticleStore;

/// Compact logs by default, JSON lines with LOG_FORMAT=json.
/// The runtime may already have installed a subscriber; that one wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newsroom_ingest=info,ingest=info,relevance=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init()?;
    let settings = load_settings_default()?;

    // --- Relevance gate ---
    let engine = KeywordRelevance::from_toml()?;
    let handle = RelevanceHandle::new(engine);
    let path = std::env::var(ENV_RELEVANCE_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));
    start_hot_reload_thread(handle.clone(), path);

    // --- Pipeline + scheduler ---
    let store = Arc::new(MemoryArticleStore::new());
    let pipeline = newsroom_ingest::build_pipeline(&settings, Arc::new(handle), store)?;
    if settings.scheduler_enabled {
        scheduler::initialize(pipeline.clone(), settings.interval());
        tracing::info!(
            interval_secs = settings.interval_secs,
            feed = %settings.feed_url,
            "ingest scheduler initialized"
        );
    }

    let state = AppState::new(pipeline, Credentials::from_env());
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
