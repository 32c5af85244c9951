// src/ingest/fetcher.rs
use anyhow::Context;
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use std::time::{Duration, Instant};

use crate::ingest::types::IngestError;

/// Identifies the platform to the upstream feed.
pub const USER_AGENT: &str = concat!(
    "newsroom-ingest/",
    env!("CARGO_PKG_VERSION"),
    " (+editorial feed importer)"
);

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Source of the raw feed document. Retries are the caller's business.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, feed_url: &str) -> Result<String, IngestError>;
}

pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, feed_url: &str) -> Result<String, IngestError> {
        let t0 = Instant::now();
        let res = async {
            let resp = self
                .client
                .get(feed_url)
                .send()
                .await
                .map_err(|e| IngestError::Fetch(describe(&e)))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(IngestError::Fetch(format!("upstream returned HTTP {status}")));
            }
            resp.text()
                .await
                .map_err(|e| IngestError::Fetch(describe(&e)))
        }
        .await;

        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        if let Err(e) = &res {
            tracing::warn!(target: "ingest", error = %e, url = feed_url, "feed fetch error");
            counter!("ingest_fetch_errors_total").increment(1);
        }
        res
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("upstream unreachable: {e}")
    } else {
        e.to_string()
    }
}

/// Serves a fixed document; for local development and tests.
pub struct FixtureFetcher {
    content: String,
}

impl FixtureFetcher {
    pub fn from_fixture(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading feed fixture from {}", path.display()))?;
        Ok(Self { content })
    }
}

#[async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, _feed_url: &str) -> Result<String, IngestError> {
        Ok(self.content.clone())
    }
}
