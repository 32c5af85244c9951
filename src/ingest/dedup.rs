// src/ingest/dedup.rs
use std::collections::HashSet;

use crate::ingest::synth::item_slug;
use crate::ingest::types::{ArticleCandidate, ExistingArticle, FeedItem};

/// Why an item was skipped as already published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    SourceUrl,
    Slug,
}

/// "Already published" state, taken once at the start of a commit run.
#[derive(Debug, Default, Clone)]
pub struct CorpusSnapshot {
    source_urls: HashSet<String>,
    slugs: HashSet<String>,
}

impl CorpusSnapshot {
    pub fn from_existing(existing: Vec<ExistingArticle>) -> Self {
        let mut snap = Self::default();
        for a in existing {
            if let Some(url) = a.source_url {
                let url = url.trim().to_string();
                if !url.is_empty() {
                    snap.source_urls.insert(url);
                }
            }
            snap.slugs.insert(a.slug);
        }
        snap
    }

    /// Remember a candidate persisted during the current run.
    pub fn record(&mut self, c: &ArticleCandidate) {
        self.source_urls.insert(c.source_url.clone());
        self.slugs.insert(c.slug.clone());
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    /// Source URL match first, then derived-slug match (same story, new link).
    pub fn is_duplicate(&self, item: &FeedItem) -> Option<DuplicateReason> {
        if self.source_urls.contains(item.link.trim()) {
            return Some(DuplicateReason::SourceUrl);
        }
        if self.slugs.contains(&item_slug(item)) {
            return Some(DuplicateReason::Slug);
        }
        None
    }
}
