//! Representative image selection for news items.
//!
//! The default extractor is a deliberate regex heuristic over the item HTML;
//! callers only see the [`ImageExtractor`] trait, so a real HTML parser can
//! replace it without touching the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DEFAULT_IMAGE_URL;
use crate::parser::RawFeedEntry;

const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

// Tried in order; the first match of each pattern is a candidate.
static IMAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)<img[^>]+src="([^">]+)""#,
        r#"(?i)<img[^>]+src='([^'>]+)'"#,
        r#"(?i)src="([^"]*\.(?:jpg|jpeg|png|gif|webp)[^"]*)""#,
        r#"(?i)src='([^']*\.(?:jpg|jpeg|png|gif|webp)[^']*)'"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Picks the image URL shown for an entry. Must always return a usable URL.
pub trait ImageExtractor: Send + Sync {
    fn extract(&self, entry: &RawFeedEntry) -> String;
}

/// Regex-based extractor with a fixed placeholder fallback.
#[derive(Debug, Clone)]
pub struct HtmlImageExtractor {
    default_image: String,
}

impl HtmlImageExtractor {
    pub fn new(default_image: impl Into<String>) -> Self {
        Self {
            default_image: default_image.into(),
        }
    }

    pub fn default_image(&self) -> &str {
        &self.default_image
    }
}

impl Default for HtmlImageExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_URL)
    }
}

impl ImageExtractor for HtmlImageExtractor {
    fn extract(&self, entry: &RawFeedEntry) -> String {
        entry
            .image_enclosure
            .as_deref()
            .filter(|url| is_image_url(url))
            .map(str::to_string)
            .or_else(|| find_image_in_html(&entry.description))
            .unwrap_or_else(|| self.default_image.clone())
    }
}

/// Scans HTML for the first `src` that passes [`is_image_url`].
pub fn find_image_in_html(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }

    IMAGE_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(html))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|candidate| is_image_url(candidate))
        .map(str::to_string)
}

/// An http(s) URL whose path ends in a known image extension.
pub fn is_image_url(candidate: &str) -> bool {
    if !candidate.starts_with("http") {
        return false;
    }
    let path = candidate
        .split_once('?')
        .map_or(candidate, |(path, _)| path)
        .to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
