// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod relevance;
pub mod store;

pub use crate::api::{router, AppState};
pub use crate::ingest::{Pipeline, PipelineCfg};

use std::sync::Arc;

use crate::ingest::config::IngestSettings;
use crate::ingest::fetcher::{FeedFetcher, FixtureFetcher, HttpFeedFetcher};
use crate::relevance::RelevanceFilter;
use crate::store::ArticleStore;

/// Wire a pipeline from settings: fixture file when configured, HTTP otherwise.
pub fn build_pipeline(
    settings: &IngestSettings,
    filter: Arc<dyn RelevanceFilter>,
    store: Arc<dyn ArticleStore>,
) -> anyhow::Result<Arc<Pipeline>> {
    let fetcher: Arc<dyn FeedFetcher> = match &settings.fixture_path {
        Some(p) => {
            tracing::warn!(path = %p.display(), "serving feed from fixture file");
            Arc::new(FixtureFetcher::from_path(p)?)
        }
        None => Arc::new(HttpFeedFetcher::new(settings.fetch_timeout())?),
    };
    let cfg = PipelineCfg::new(settings.feed_url.clone())
        .with_persist_timeout(settings.persist_timeout());
    Ok(Arc::new(Pipeline::new(fetcher, filter, store, cfg)))
}
