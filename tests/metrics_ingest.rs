// tests/metrics_ingest.rs
//
// Installs the process-wide recorder once, runs the pipeline, then scrapes.
// Keep this the only test in the binary: a recorder can only be installed once.

use std::sync::Arc;

use newsroom_ingest::ingest::fetcher::FixtureFetcher;
use newsroom_ingest::metrics::Metrics;
use newsroom_ingest::relevance::KeywordRelevance;
use newsroom_ingest::store::MemoryArticleStore;
use newsroom_ingest::{Pipeline, PipelineCfg};

#[tokio::test]
async fn metrics_exposed_after_commit_and_preview() {
    let metrics = Metrics::init().expect("recorder");

    let xml = std::fs::read_to_string("tests/fixtures/labor_feed.xml").expect("fixture");
    let p = Pipeline::new(
        Arc::new(FixtureFetcher::from_fixture(&xml)),
        Arc::new(KeywordRelevance::default_seed()),
        Arc::new(MemoryArticleStore::new()),
        PipelineCfg::new("https://wire.example/rss"),
    );
    let _ = p.preview().await;
    let _ = p.commit().await;
    let _ = p.commit().await; // second pass only finds duplicates

    // Scrape metrics text and check series presence by substring
    let out = metrics.handle.render();
    assert!(out.contains("ingest_runs_total"), "{out}");
    assert!(out.contains(r#"mode="commit""#));
    assert!(out.contains(r#"mode="preview""#));
    assert!(out.contains("ingest_items_parsed_total"));
    assert!(out.contains("ingest_relevant_total"));
    assert!(out.contains("ingest_created_total"));
    assert!(out.contains("ingest_duplicates_total"));
    assert!(out.contains("ingest_parse_ms"));
    assert!(out.contains("ingest_last_run_ts"));
}
