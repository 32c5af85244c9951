// src/ingest/mod.rs
//! Feed ingestion: fetch → parse → filter → dedupe → synthesize → persist.

pub mod config;
pub mod dedup;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
pub mod scheduler;
pub mod synth;
pub mod types;

pub use pipeline::{Pipeline, PipelineCfg};
pub use types::{ArticleCandidate, FeedItem, IngestError, IngestionResult, PreviewOutcome};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Pipeline runs, labelled by mode.");
        describe_counter!("ingest_items_parsed_total", "Items parsed from the feed.");
        describe_counter!(
            "ingest_relevant_total",
            "Items that passed the relevance filter."
        );
        describe_counter!("ingest_created_total", "Articles persisted by commit runs.");
        describe_counter!(
            "ingest_duplicates_total",
            "Items skipped because the story already exists."
        );
        describe_counter!(
            "ingest_persist_errors_total",
            "Item-level persistence failures."
        );
        describe_counter!("ingest_fetch_errors_total", "Feed fetch failures.");
        describe_counter!("ingest_parse_errors_total", "Feed parse failures.");
        describe_counter!(
            "ingest_scheduler_ticks_total",
            "Scheduler ticks that triggered a commit."
        );
        describe_histogram!("ingest_fetch_ms", "Feed fetch time in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the ingest pipeline last finished."
        );
    });
}

fn re_tags() -> &'static Regex {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn ascii_quotes(s: &str) -> String {
    s.replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Normalize a single-line field: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let out = html_escape::decode_html_entities(s);

    // 2) Strip HTML tags
    let out = re_tags().replace_all(&out, " ");

    // 3) Normalize typographic quotes to ASCII
    let out = ascii_quotes(&out);

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Like [`normalize_text`] but keeps paragraph breaks as blank lines.
pub fn normalize_body(s: &str) -> String {
    static RE_BREAKS: OnceCell<Regex> = OnceCell::new();
    let re_breaks = RE_BREAKS.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|blockquote)>").unwrap()
    });
    let marked = re_breaks.replace_all(s, "\n\n");

    marked
        .split("\n\n")
        .map(normalize_text)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
