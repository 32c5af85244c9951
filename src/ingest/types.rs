// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One normalized entry from the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String, // external identity of the story
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub body: String,
}

/// Article record shape handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCandidate {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub published_date: DateTime<Utc>,
    pub source_url: String,
    pub published: bool,
}

impl ArticleCandidate {
    /// Copy of this candidate marked for publication (commit path only).
    pub fn published(&self) -> Self {
        Self {
            published: true,
            ..self.clone()
        }
    }
}

/// Dedup keys of an article already in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingArticle {
    pub source_url: Option<String>,
    pub slug: String,
}

/// Outcome of every pipeline run, preview or commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    /// True iff fetch + parse succeeded; item-level failures never flip it.
    pub success: bool,
    pub articles_processed: usize,
    pub articles_created: usize,
    pub duplicates_skipped: usize,
    pub errors: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionResult {
    pub(crate) fn failed(err: impl ToString) -> Self {
        Self {
            success: false,
            articles_processed: 0,
            articles_created: 0,
            duplicates_skipped: 0,
            errors: vec![err.to_string()],
            finished_at: Utc::now(),
        }
    }
}

/// Display-safe view of a relevant item; body replaced by its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub content_length: usize,
}

impl From<&FeedItem> for PreviewItem {
    fn from(it: &FeedItem) -> Self {
        Self {
            title: it.title.clone(),
            link: it.link.clone(),
            summary: it.summary.clone(),
            published_at: it.published_at,
            content_length: it.body.chars().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewOutcome {
    #[serde(flatten)]
    pub result: IngestionResult,
    pub items: Vec<PreviewItem>,
}

/// Failure taxonomy of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("feed fetch failed: {0}")]
    Fetch(String),

    #[error("feed parse failed: {0}")]
    Parse(String),

    #[error("{title}: {reason}")]
    Persist { title: String, reason: String },

    #[error("loading existing articles failed: {0}")]
    Corpus(String),
}
