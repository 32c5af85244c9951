// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "INGEST_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/ingest.toml";

pub const DEFAULT_FEED_URL: &str = "https://www.commondreams.org/feeds/news.rss";

/// Pipeline + scheduler settings. Secrets live in [`crate::config::Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub feed_url: String,
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub persist_timeout_secs: u64,
    pub scheduler_enabled: bool,
    /// Serve the feed from a local file instead of the network (dev only).
    pub fixture_path: Option<PathBuf>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            interval_secs: 3600,
            fetch_timeout_secs: 20,
            persist_timeout_secs: 10,
            scheduler_enabled: true,
            fixture_path: None,
        }
    }
}

impl IngestSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.clamp(1, 120))
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs.clamp(1, 120))
    }
}

/// Load settings from an explicit TOML path.
pub fn load_settings_from(path: &Path) -> Result<IngestSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest settings from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load settings using env var + fallbacks, then apply env overrides:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) built-in defaults
pub fn load_settings_default() -> Result<IngestSettings> {
    let base = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("INGEST_CONFIG_PATH points to non-existent path"));
        }
        load_settings_from(&pb)?
    } else {
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            load_settings_from(&default_p)?
        } else {
            IngestSettings::default()
        }
    };
    apply_env_overrides(base)
}

fn apply_env_overrides(mut s: IngestSettings) -> Result<IngestSettings> {
    if let Some(v) = env_nonempty("FEED_URL") {
        s.feed_url = v;
    }
    if let Some(v) = env_nonempty("INGEST_INTERVAL_SECS") {
        s.interval_secs = v.parse().context("INGEST_INTERVAL_SECS must be an integer")?;
    }
    if let Some(v) = env_nonempty("FETCH_TIMEOUT_SECS") {
        s.fetch_timeout_secs = v.parse().context("FETCH_TIMEOUT_SECS must be an integer")?;
    }
    if let Some(v) = env_nonempty("PERSIST_TIMEOUT_SECS") {
        s.persist_timeout_secs = v
            .parse()
            .context("PERSIST_TIMEOUT_SECS must be an integer")?;
    }
    if let Some(v) = env_nonempty("INGEST_SCHEDULER_ENABLED") {
        s.scheduler_enabled = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = env_nonempty("INGEST_FIXTURE_PATH") {
        s.fixture_path = Some(PathBuf::from(v));
    }
    Ok(s)
}

pub(crate) fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
