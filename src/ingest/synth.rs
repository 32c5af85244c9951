// src/ingest/synth.rs
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::ingest::types::{ArticleCandidate, FeedItem};

pub const MAX_SLUG_LEN: usize = 80;
pub const SUMMARY_FALLBACK_CHARS: usize = 200;
const FALLBACK_SLUG: &str = "article";

/// Lowercase alphanumerics joined by single dashes; empty when the title has none.
fn title_words(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    if slug.chars().count() > MAX_SLUG_LEN {
        slug = slug.chars().take(MAX_SLUG_LEN).collect();
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Deterministic URL slug: lowercase alphanumerics joined by single dashes.
pub fn slugify(title: &str) -> String {
    let slug = title_words(title);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Slug of a feed item. A title without any word falls back to
/// `article-<link digest>` so distinct stories never share the fallback.
pub fn item_slug(item: &FeedItem) -> String {
    let slug = title_words(&item.title);
    if !slug.is_empty() {
        return slug;
    }
    let digest = Sha256::digest(item.link.trim().as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{FALLBACK_SLUG}-{short}")
}

/// Cut `text` to at most `max` chars on a word boundary, marking the cut with `…`.
pub fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(i) if i > 0 => &head[..i],
        _ => head.as_str(),
    };
    format!("{}…", cut.trim_end_matches(|c: char| c.is_whitespace() || c == ','))
}

/// Map a feed item to the article record shape. `published` stays false.
pub fn synthesize(item: &FeedItem, now: DateTime<Utc>) -> ArticleCandidate {
    let summary = if item.summary.trim().is_empty() {
        let flat = item.body.split_whitespace().collect::<Vec<_>>().join(" ");
        truncate_words(&flat, SUMMARY_FALLBACK_CHARS)
    } else {
        item.summary.clone()
    };

    ArticleCandidate {
        slug: item_slug(item),
        title: item.title.clone(),
        summary,
        body: item.body.clone(),
        published_date: item.published_at.unwrap_or(now),
        source_url: item.link.clone(),
        published: false,
    }
}
