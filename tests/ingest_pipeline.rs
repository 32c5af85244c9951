// tests/ingest_pipeline.rs
//
// End-to-end runs of the orchestrator over the fixture feed, with the default
// editorial rules and in-memory / failing stores.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use newsroom_ingest::ingest::fetcher::FixtureFetcher;
use newsroom_ingest::ingest::types::{ArticleCandidate, ExistingArticle};
use newsroom_ingest::relevance::KeywordRelevance;
use newsroom_ingest::store::{ArticleStore, MemoryArticleStore};
use newsroom_ingest::{Pipeline, PipelineCfg};

const FEED_XML: &str = include_str!("fixtures/labor_feed.xml");

// Relevant stories in feed order (default rules).
const RELEVANT: [&str; 5] = [
    "https://wire.example/2025/10/amazon-warehouse-vote",
    "https://wire.example/2025/10/council-budget",
    "https://wire.example/2025/10/nurses-strike",
    "https://wire.example/2025/10/teachers-rally",
    "https://wire.example/2025/10/rideshare-drivers",
];

fn pipeline_with(store: Arc<dyn ArticleStore>) -> Pipeline {
    Pipeline::new(
        Arc::new(FixtureFetcher::from_fixture(FEED_XML)),
        Arc::new(KeywordRelevance::default_seed()),
        store,
        PipelineCfg::new("https://wire.example/rss"),
    )
}

/// Fails exactly the n-th `create` call (1-based) and records every attempt.
struct FailNthStore {
    inner: MemoryArticleStore,
    fail_on: usize,
    attempts: AtomicUsize,
    attempted_urls: std::sync::Mutex<Vec<String>>,
}

impl FailNthStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: MemoryArticleStore::new(),
            fail_on,
            attempts: AtomicUsize::new(0),
            attempted_urls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArticleStore for FailNthStore {
    async fn existing_keys(&self) -> Result<Vec<ExistingArticle>> {
        self.inner.existing_keys().await
    }

    async fn create(&self, candidate: &ArticleCandidate) -> Result<()> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.attempted_urls
            .lock()
            .unwrap()
            .push(candidate.source_url.clone());
        if n == self.fail_on {
            anyhow::bail!("database unavailable");
        }
        self.inner.create(candidate).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn commit_creates_relevant_articles_in_feed_order() {
    let store = Arc::new(MemoryArticleStore::new());
    let r = pipeline_with(store.clone()).commit().await;

    assert!(r.success);
    assert_eq!(r.articles_processed, 5);
    assert_eq!(r.articles_created, 5);
    assert!(r.errors.is_empty(), "{:?}", r.errors);

    let saved = store.snapshot();
    let urls: Vec<&str> = saved.iter().map(|a| a.source_url.as_str()).collect();
    assert_eq!(urls, RELEVANT);
    assert!(saved.iter().all(|a| a.published));

    let council = &saved[1];
    assert_eq!(council.slug, "city-council-debates-budget");
    assert!(council.summary.contains("minimum wage"), "summary defaulted from body");

    let nurses = &saved[2];
    assert_eq!(nurses.published_date.to_rfc3339(), "2025-10-07T08:00:00+00:00");
}

#[tokio::test]
async fn second_commit_over_unchanged_feed_creates_nothing() {
    let store = Arc::new(MemoryArticleStore::new());
    let p = pipeline_with(store.clone());

    let first = p.commit().await;
    assert_eq!(first.articles_created, 5);

    let second = p.commit().await;
    assert!(second.success);
    assert_eq!(second.articles_processed, 5);
    assert_eq!(second.articles_created, 0);
    assert_eq!(second.duplicates_skipped, 5);
    assert!(second.errors.is_empty(), "duplicates are not errors");
    assert_eq!(store.count().await.unwrap(), 5);
}

#[tokio::test]
async fn one_failed_write_does_not_abort_the_run() {
    let store = Arc::new(FailNthStore::new(3));
    let r = pipeline_with(store.clone()).commit().await;

    assert!(r.success);
    assert_eq!(r.articles_processed, 5);
    assert_eq!(r.articles_created, 4);
    assert_eq!(r.errors.len(), 1);
    assert!(r.errors[0].contains("Nurses strike enters third week"));
    assert!(r.errors[0].contains("database unavailable"));

    // items after the failure were still attempted
    let attempted = store.attempted_urls.lock().unwrap().clone();
    assert_eq!(attempted, RELEVANT);
    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn changed_link_with_same_title_is_a_duplicate() {
    let existing = ArticleCandidate {
        slug: "nurses-strike-enters-third-week".into(),
        title: "Nurses strike enters third week".into(),
        summary: String::new(),
        body: String::new(),
        published_date: Utc::now(),
        source_url: "https://old-wire.example/nurses".into(),
        published: true,
    };
    let store = Arc::new(MemoryArticleStore::with_articles(vec![existing]));
    let r = pipeline_with(store.clone()).commit().await;

    assert!(r.success);
    assert_eq!(r.articles_processed, 5);
    assert_eq!(r.articles_created, 4);
    assert_eq!(r.duplicates_skipped, 1);
    assert!(r.errors.is_empty());
    assert!(!store
        .snapshot()
        .iter()
        .any(|a| a.source_url == "https://wire.example/2025/10/nurses-strike"));
}

#[tokio::test]
async fn preview_lists_candidates_without_touching_the_store() {
    let store = Arc::new(MemoryArticleStore::new());
    let p = pipeline_with(store.clone());
    let before = store.count().await.unwrap();

    let out = p.preview().await;
    assert!(out.result.success);
    assert_eq!(out.result.articles_processed, 5);
    assert_eq!(out.result.articles_created, 0);
    assert_eq!(out.items.len(), 5);

    let council = &out.items[1];
    assert_eq!(council.title, "City council debates budget");
    assert_eq!(
        council.content_length,
        "The proposal would raise the minimum wage to $20 by 2027.".chars().count()
    );
    assert_eq!(store.count().await.unwrap(), before);
}

#[tokio::test]
async fn unparseable_feed_fails_the_run() {
    let store = Arc::new(MemoryArticleStore::new());
    let p = Pipeline::new(
        Arc::new(FixtureFetcher::from_fixture("<html><body>502 Bad Gateway</body></html>")),
        Arc::new(KeywordRelevance::default_seed()),
        store.clone(),
        PipelineCfg::new("https://wire.example/rss"),
    );
    let r = p.commit().await;
    assert!(!r.success);
    assert_eq!(r.articles_processed, 0);
    assert_eq!(r.articles_created, 0);
    assert_eq!(r.errors.len(), 1);
    assert!(r.errors[0].starts_with("feed parse failed"));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn extension_elements_do_not_fail_the_run() {
    let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <atom:link href="https://wire.example/rss" rel="self" type="application/rss+xml"/>
    <item>
      <title>Grocery workers ratify first contract</title>
      <link>https://wire.example/2025/10/grocery-contract</link>
      <atom:link href="https://wire.example/amp/grocery-contract" rel="amphtml"/>
      <media:title>Union members outside the store</media:title>
      <description>The union vote passed overwhelmingly.</description>
    </item>
    <lastBuildDate>Tue, 07 Oct 2025 12:00:00 GMT</lastBuildDate>
    <item>
      <title>Warehouse walkout spreads</title>
      <link>https://wire.example/2025/10/warehouse-walkout</link>
    </item>
  </channel>
</rss>"#;
    let store = Arc::new(MemoryArticleStore::new());
    let p = Pipeline::new(
        Arc::new(FixtureFetcher::from_fixture(xml)),
        Arc::new(KeywordRelevance::default_seed()),
        store.clone(),
        PipelineCfg::new("https://wire.example/rss"),
    );
    let r = p.commit().await;
    assert!(r.success, "{:?}", r.errors);
    assert_eq!(r.articles_created, 2);
    let urls: Vec<String> = store.snapshot().into_iter().map(|a| a.source_url).collect();
    assert_eq!(
        urls,
        [
            "https://wire.example/2025/10/grocery-contract",
            "https://wire.example/2025/10/warehouse-walkout"
        ]
    );
}
