// src/config/auth.rs
use sha2::{Digest, Sha256};

use crate::ingest::config::env_nonempty;

pub const ENV_CRON_SECRET: &str = "CRON_SECRET";
pub const ENV_API_KEY: &str = "INGEST_API_KEY";
pub const ENV_ADMIN_TOKEN: &str = "INGEST_ADMIN_TOKEN";

/// What a bearer credential unlocks. Each capability has its own secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Scheduled commit (`/api/cron/ingest`).
    Cron,
    /// Dry-run preview (`/api/ingest/preview`).
    Preview,
    /// Manual commit from the admin surface (`/api/admin/ingest`).
    Admin,
}

/// Shared secrets for the trigger endpoints. An unset secret locks its route.
#[derive(Clone, Default)]
pub struct Credentials {
    cron_secret: Option<String>,
    api_key: Option<String>,
    admin_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn new(
        cron_secret: Option<String>,
        api_key: Option<String>,
        admin_token: Option<String>,
    ) -> Self {
        let clean = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            cron_secret: clean(cron_secret),
            api_key: clean(api_key),
            admin_token: clean(admin_token),
        }
    }

    pub fn from_env() -> Self {
        let creds = Self::new(
            env_nonempty(ENV_CRON_SECRET),
            env_nonempty(ENV_API_KEY),
            env_nonempty(ENV_ADMIN_TOKEN),
        );
        for (cap, name) in [
            (Capability::Cron, ENV_CRON_SECRET),
            (Capability::Preview, ENV_API_KEY),
            (Capability::Admin, ENV_ADMIN_TOKEN),
        ] {
            if creds.secret(cap).is_none() {
                tracing::warn!(var = name, "secret not set; its trigger endpoint is locked");
            }
        }
        creds
    }

    fn secret(&self, cap: Capability) -> Option<&str> {
        match cap {
            Capability::Cron => self.cron_secret.as_deref(),
            Capability::Preview => self.api_key.as_deref(),
            Capability::Admin => self.admin_token.as_deref(),
        }
    }

    /// Check an `Authorization` header value (`Bearer <token>`) for `cap`.
    pub fn authorize(&self, cap: Capability, header: Option<&str>) -> bool {
        let Some(expected) = self.secret(cap) else {
            return false;
        };
        let Some(token) = header.and_then(bearer_token) else {
            return false;
        };
        // Compare fixed-size digests so the comparison time doesn't track the secret's prefix
        Sha256::digest(token.as_bytes()) == Sha256::digest(expected.as_bytes())
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
