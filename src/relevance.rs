// src/relevance.rs
//! Editorial relevance gate: decides whether a feed item fits the platform's
//! focus (labor, social justice, working-class politics).
//!
//! The pipeline only sees the [`RelevanceFilter`] trait. The default engine is a
//! keyword/pattern matcher configured from TOML, with blocker phrases that
//! neutralize false friends ("European Union", "Labor Day sale").

use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::ingest::types::FeedItem;

// --- env defaults & names ---
pub const DEFAULT_RELEVANCE_CONFIG_PATH: &str = "config/relevance.toml";
pub const ENV_RELEVANCE_CONFIG_PATH: &str = "RELEVANCE_CONFIG_PATH";
pub const ENV_RELEVANCE_HOT_RELOAD: &str = "RELEVANCE_HOT_RELOAD";

/// Built-in editorial rules, used when no config file is present.
pub const DEFAULT_RELEVANCE_TOML: &str = r#"
[relevance]
min_hits = 1
keywords = [
    "labor", "labour", "union", "unions", "unionize", "unionized", "unionizing",
    "picket", "picket line", "walkout", "walkouts", "collective bargaining",
    "minimum wage", "living wage", "wage theft", "wages", "overtime pay",
    "working class", "working-class", "workers", "worker", "workers' rights",
    "social justice", "racial justice", "economic justice", "inequality",
    "poverty", "eviction", "evictions", "tenant union", "gig workers",
    "layoffs", "laid off", "solidarity", "NLRB", "OSHA", "AFL-CIO",
    "Teamsters", "UAW", "SEIU", "pension", "pensions",
]

[[patterns]]
id = "strike_action"
pattern = "(?i)\\b(on strike|strikes?|striking|strikers)\\b"

[[patterns]]
id = "organizing"
pattern = "(?i)\\b(organi[sz](e|ed|ing)) (workers|a union|the workplace)\\b"

[[blockers]]
id = "eu"
pattern = "(?i)\\beuropean union\\b"
reason = "European Union"

[[blockers]]
id = "soviet"
pattern = "(?i)\\bsoviet union\\b"
reason = "Soviet Union"

[[blockers]]
id = "union_station"
pattern = "(?i)\\bunion (station|square)\\b"
reason = "place name"

[[blockers]]
id = "labor_day_sales"
pattern = "(?i)\\blabou?r day (sales?|deals?|weekend deals?)\\b"
reason = "retail promotion"

[[blockers]]
id = "sports_strike"
pattern = "(?i)\\b(strike (zone|price)|lucky strike|air ?strikes?)\\b"
reason = "non-labor strike"
"#;

/// Strategy seam: the pipeline's single point of editorial taste.
pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, item: &FeedItem) -> bool;
}

/// Any plain predicate works as a filter.
impl<F> RelevanceFilter for F
where
    F: Fn(&FeedItem) -> bool + Send + Sync,
{
    fn is_relevant(&self, item: &FeedItem) -> bool {
        self(item)
    }
}

/// Result of relevance evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relevance {
    pub relevant: bool,
    pub matched: Vec<String>,
    pub blocked_by: Vec<String>,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceRoot {
    pub relevance: RelevanceSection,
    #[serde(default)]
    pub patterns: Vec<PatternCfg>,
    #[serde(default)]
    pub blockers: Vec<BlockerCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceSection {
    #[serde(default = "default_min_hits")]
    pub min_hits: usize,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_min_hits() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternCfg {
    pub id: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockerCfg {
    pub id: String,
    pub pattern: String,
    pub reason: String,
}

/* ----------------------------
Compiled engine
---------------------------- */

#[derive(Debug)]
struct CompiledRule {
    id: String,
    re: Regex,
}

#[derive(Debug)]
struct CompiledBlocker {
    cfg: BlockerCfg,
    re: Regex,
}

/// Keyword engine: holds compiled regexes for keywords, patterns and blockers.
#[derive(Debug)]
pub struct KeywordRelevance {
    pub cfg: RelevanceRoot,
    rules: Vec<CompiledRule>,
    blockers: Vec<CompiledBlocker>,
}

impl KeywordRelevance {
    /// Built-in rules.
    pub fn default_seed() -> Self {
        Self::from_toml_str(DEFAULT_RELEVANCE_TOML).expect("built-in relevance rules compile")
    }

    /// Load from RELEVANCE_CONFIG_PATH or "config/relevance.toml".
    /// A missing default file falls back to the built-in rules; a missing
    /// explicitly configured file is an error.
    pub fn from_toml() -> anyhow::Result<Self> {
        let explicit = std::env::var(ENV_RELEVANCE_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));

        if explicit.is_none() && !path.exists() {
            info!(target: "relevance", "no relevance config file, using built-in rules");
            return Ok(Self::default_seed());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read relevance config at {}: {}",
                path.display(),
                e
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: RelevanceRoot = toml::from_str(toml_str)?;

        let mut rules = Vec::with_capacity(cfg.relevance.keywords.len() + cfg.patterns.len());
        for kw in &cfg.relevance.keywords {
            let kw = kw.trim();
            if kw.is_empty() {
                continue;
            }
            // \b only anchors on word chars; keywords like "workers'" end on punctuation
            let re = Regex::new(&format!(r"(?i)(^|\W){}($|\W)", regex::escape(kw)))
                .map_err(|e| anyhow::anyhow!("keyword `{}` regex error: {}", kw, e))?;
            rules.push(CompiledRule {
                id: kw.to_lowercase(),
                re,
            });
        }
        for p in &cfg.patterns {
            let re = Regex::new(&p.pattern)
                .map_err(|e| anyhow::anyhow!("pattern `{}` regex error: {}", p.id, e))?;
            rules.push(CompiledRule {
                id: p.id.clone(),
                re,
            });
        }

        let blockers = cfg
            .blockers
            .iter()
            .cloned()
            .map(|b| {
                let re = Regex::new(&b.pattern)
                    .map_err(|e| anyhow::anyhow!("blocker `{}` regex error: {}", b.id, e))?;
                Ok(CompiledBlocker { cfg: b, re })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if rules.is_empty() {
            anyhow::bail!("relevance config defines no keywords or patterns");
        }

        Ok(Self {
            cfg,
            rules,
            blockers,
        })
    }

    /// Remove blocker phrases from `text`, recording which ones fired.
    fn neutralize(&self, text: &str, blocked_by: &mut Vec<String>) -> String {
        let mut out = text.to_string();
        for b in &self.blockers {
            if b.re.is_match(&out) {
                out = b.re.replace_all(&out, " ").into_owned();
                let tag = format!("blocker:{}:{}", b.cfg.id, b.cfg.reason);
                if !blocked_by.contains(&tag) {
                    blocked_by.push(tag);
                }
            }
        }
        out
    }

    /// Evaluate title, summary and body independently; hits from any field count.
    pub fn evaluate(&self, item: &FeedItem) -> Relevance {
        let mut rel = Relevance::default();

        for field in [&item.title, &item.summary, &item.body] {
            if field.trim().is_empty() {
                continue;
            }
            let text = self.neutralize(field, &mut rel.blocked_by);
            for r in &self.rules {
                if !rel.matched.contains(&r.id) && r.re.is_match(&text) {
                    rel.matched.push(r.id.clone());
                }
            }
        }

        rel.relevant = rel.matched.len() >= self.cfg.relevance.min_hits.max(1);
        rel
    }
}

impl RelevanceFilter for KeywordRelevance {
    fn is_relevant(&self, item: &FeedItem) -> bool {
        let rel = self.evaluate(item);
        debug!(
            target: "relevance",
            link = %item.link,
            relevant = rel.relevant,
            matched = ?truncate_vec(&rel.matched, 5),
            blocked = ?rel.blocked_by,
            "relevance evaluated"
        );
        rel.relevant
    }
}

pub(crate) fn truncate_vec<T: ToString>(v: &[T], max: usize) -> Vec<String> {
    v.iter().take(max).map(|x| x.to_string()).collect()
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// A threadsafe handle that can hot-reload the underlying engine.
/// Enable by setting RELEVANCE_HOT_RELOAD=1.
#[derive(Clone)]
pub struct RelevanceHandle {
    inner: Arc<RwLock<KeywordRelevance>>,
}

impl RelevanceHandle {
    pub fn new(engine: KeywordRelevance) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn evaluate(&self, item: &FeedItem) -> Relevance {
        match self.inner.read() {
            Ok(eng) => eng.evaluate(item),
            Err(_) => Relevance::default(),
        }
    }

    /// Swap in a new engine (used by hot reload).
    pub fn replace(&self, engine: KeywordRelevance) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = engine;
        }
    }
}

impl RelevanceFilter for RelevanceHandle {
    fn is_relevant(&self, item: &FeedItem) -> bool {
        match self.inner.read() {
            Ok(eng) => eng.is_relevant(item),
            Err(_) => false,
        }
    }
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_RELEVANCE_HOT_RELOAD)
        .ok()
        .is_some_and(|v| v == "1")
}

/// Start a simple polling watcher on `path` to hot-reload into `handle`.
/// Polls mtime every 2s. A config that fails to compile keeps the old engine.
pub fn start_hot_reload_thread(handle: RelevanceHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }
    info!(target: "relevance", path = %path.display(), "relevance hot reload enabled");

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match fs::read_to_string(&path)
                        .map_err(anyhow::Error::from)
                        .and_then(|c| KeywordRelevance::from_toml_str(&c))
                    {
                        Ok(engine) => {
                            handle.replace(engine);
                            info!(target: "relevance", "relevance rules reloaded");
                        }
                        Err(e) => warn!(target: "relevance", error = %e, "relevance reload rejected"),
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */
