// src/ingest/pipeline.rs
use chrono::Utc;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::ingest::dedup::{CorpusSnapshot, DuplicateReason};
use crate::ingest::fetcher::FeedFetcher;
use crate::ingest::parser::parse_feed;
use crate::ingest::synth::synthesize;
use crate::ingest::types::{
    FeedItem, IngestError, IngestionResult, PreviewItem, PreviewOutcome,
};
use crate::relevance::RelevanceFilter;
use crate::store::ArticleStore;

/// Stages of one run; fetch/parse failures jump straight to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetching,
    Parsing,
    Filtering,
    LoadingCorpus,
    ProcessingItems,
    Done,
}

#[derive(Debug, Clone)]
pub struct PipelineCfg {
    pub feed_url: String,
    /// Upper bound for a single article write.
    pub persist_timeout: Duration,
}

impl PipelineCfg {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            persist_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }
}

/// Composes fetcher, relevance filter and store into preview/commit runs.
pub struct Pipeline {
    fetcher: Arc<dyn FeedFetcher>,
    filter: Arc<dyn RelevanceFilter>,
    store: Arc<dyn ArticleStore>,
    cfg: PipelineCfg,
    // Serializes commit runs inside this process.
    commit_lock: Mutex<()>,
}

fn enter(stage: RunStage) {
    tracing::debug!(target: "ingest", ?stage, "pipeline stage");
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        filter: Arc<dyn RelevanceFilter>,
        store: Arc<dyn ArticleStore>,
        cfg: PipelineCfg,
    ) -> Self {
        crate::ingest::ensure_metrics_described();
        Self {
            fetcher,
            filter,
            store,
            cfg,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn cfg(&self) -> &PipelineCfg {
        &self.cfg
    }

    /// Fetching → Parsing → Filtering. Errors are fatal to the run.
    async fn fetch_relevant(&self) -> Result<Vec<FeedItem>, IngestError> {
        enter(RunStage::Fetching);
        let raw = self.fetcher.fetch(&self.cfg.feed_url).await?;

        enter(RunStage::Parsing);
        let items = parse_feed(&raw)?;
        let total = items.len();

        enter(RunStage::Filtering);
        let relevant: Vec<FeedItem> = items
            .into_iter()
            .filter(|it| self.filter.is_relevant(it))
            .collect();

        counter!("ingest_relevant_total").increment(relevant.len() as u64);
        tracing::info!(
            target: "ingest",
            total,
            relevant = relevant.len(),
            "feed classified"
        );
        Ok(relevant)
    }

    /// Dry run: fetch and classify, never touch the store.
    pub async fn preview(&self) -> PreviewOutcome {
        counter!("ingest_runs_total", "mode" => "preview").increment(1);

        let outcome = match self.fetch_relevant().await {
            Ok(items) => PreviewOutcome {
                result: IngestionResult {
                    success: true,
                    articles_processed: items.len(),
                    articles_created: 0,
                    duplicates_skipped: 0,
                    errors: Vec::new(),
                    finished_at: Utc::now(),
                },
                items: items.iter().map(PreviewItem::from).collect(),
            },
            Err(e) => PreviewOutcome {
                result: IngestionResult::failed(e),
                items: Vec::new(),
            },
        };
        enter(RunStage::Done);
        outcome
    }

    /// Fetch, classify, dedupe and persist. Item failures are collected, not fatal.
    pub async fn commit(&self) -> IngestionResult {
        let _guard = self.commit_lock.lock().await;
        counter!("ingest_runs_total", "mode" => "commit").increment(1);

        let result = match self.fetch_relevant().await {
            Ok(items) => self.persist_all(items).await,
            Err(e) => IngestionResult::failed(e),
        };
        enter(RunStage::Done);

        gauge!("ingest_last_run_ts").set(result.finished_at.timestamp() as f64);
        tracing::info!(
            target: "ingest",
            success = result.success,
            processed = result.articles_processed,
            created = result.articles_created,
            duplicates = result.duplicates_skipped,
            errors = result.errors.len(),
            "commit run finished"
        );
        result
    }

    async fn persist_all(&self, items: Vec<FeedItem>) -> IngestionResult {
        let mut result = IngestionResult {
            success: true,
            articles_processed: items.len(),
            articles_created: 0,
            duplicates_skipped: 0,
            errors: Vec::new(),
            finished_at: Utc::now(),
        };

        enter(RunStage::LoadingCorpus);
        let mut corpus = match self.store.existing_keys().await {
            Ok(existing) => CorpusSnapshot::from_existing(existing),
            Err(e) => {
                let err = IngestError::Corpus(format!("{e:#}"));
                tracing::warn!(target: "ingest", error = %err, "cannot snapshot corpus");
                result.errors.push(err.to_string());
                result.finished_at = Utc::now();
                return result;
            }
        };

        enter(RunStage::ProcessingItems);
        let now = Utc::now();
        for item in items {
            if let Some(reason) = corpus.is_duplicate(&item) {
                result.duplicates_skipped += 1;
                let by = match reason {
                    DuplicateReason::SourceUrl => "source_url",
                    DuplicateReason::Slug => "slug",
                };
                counter!("ingest_duplicates_total", "by" => by).increment(1);
                tracing::debug!(target: "ingest", link = %item.link, ?reason, "duplicate skipped");
                continue;
            }

            let candidate = synthesize(&item, now).published();
            let write = tokio::time::timeout(self.cfg.persist_timeout, self.store.create(&candidate));
            let outcome = match write.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err(format!(
                    "store write timed out after {}s",
                    self.cfg.persist_timeout.as_secs_f32()
                )),
            };

            match outcome {
                Ok(()) => {
                    result.articles_created += 1;
                    counter!("ingest_created_total").increment(1);
                    tracing::debug!(target: "ingest", slug = %candidate.slug, "article created");
                    corpus.record(&candidate);
                }
                Err(reason) => {
                    let err = IngestError::Persist {
                        title: candidate.title.clone(),
                        reason,
                    };
                    counter!("ingest_persist_errors_total").increment(1);
                    tracing::warn!(target: "ingest", slug = %candidate.slug, error = %err, "article not persisted");
                    result.errors.push(err.to_string());
                }
            }
        }

        result.finished_at = Utc::now();
        result
    }
}
