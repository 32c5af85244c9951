// src/store.rs
//! Port to the platform's article store, plus an in-memory backend.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::ingest::types::{ArticleCandidate, ExistingArticle};

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Dedup keys (source url + slug) of every stored article.
    async fn existing_keys(&self) -> Result<Vec<ExistingArticle>>;

    /// Persist one article. Must reject a slug that is already taken.
    async fn create(&self, candidate: &ArticleCandidate) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

/// Process-local store; the default backend and the test double.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: Mutex<Vec<ArticleCandidate>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<ArticleCandidate>) -> Self {
        Self {
            articles: Mutex::new(articles),
        }
    }

    pub fn snapshot(&self) -> Vec<ArticleCandidate> {
        self.articles.lock().expect("store mutex poisoned").clone()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn existing_keys(&self) -> Result<Vec<ExistingArticle>> {
        let v = self.articles.lock().expect("store mutex poisoned");
        Ok(v.iter()
            .map(|a| ExistingArticle {
                source_url: Some(a.source_url.clone()),
                slug: a.slug.clone(),
            })
            .collect())
    }

    async fn create(&self, candidate: &ArticleCandidate) -> Result<()> {
        let mut v = self.articles.lock().expect("store mutex poisoned");
        if v.iter().any(|a| a.slug == candidate.slug) {
            bail!("unique constraint violated on slug `{}`", candidate.slug);
        }
        if v.iter().any(|a| a.source_url == candidate.source_url) {
            bail!(
                "unique constraint violated on source url `{}`",
                candidate.source_url
            );
        }
        v.push(candidate.clone());
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.articles.lock().expect("store mutex poisoned").len())
    }
}
