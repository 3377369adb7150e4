use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One registered news category feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Stable slug, e.g. `sports`
    pub id: String,
    /// Display name shown in category tabs
    pub name: String,
    /// Feed endpoint (fetched through the relay)
    pub url: String,
    /// Attribution label copied onto every item from this feed
    #[serde(rename = "source")]
    pub source_label: String,
}

impl FeedSource {
    pub fn new(id: &str, name: &str, url: &str, source_label: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            source_label: source_label.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No feed registered with id '{0}'")]
    SourceNotFound(String),
}

/// Built-in category list used when the configuration does not name any feeds.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "top",
            "トップ",
            "https://news.livedoor.com/topics/rss/top.xml",
            "Livedoor News",
        ),
        FeedSource::new(
            "domestic",
            "国内",
            "https://news.livedoor.com/topics/rss/dom.xml",
            "Livedoor News",
        ),
        FeedSource::new(
            "world",
            "国際",
            "https://news.livedoor.com/topics/rss/int.xml",
            "Livedoor News",
        ),
        FeedSource::new(
            "business",
            "経済",
            "http://www3.nhk.or.jp/rss/news/cat1.xml",
            "NHK News",
        ),
        FeedSource::new(
            "entertainment",
            "エンタメ",
            "https://www.nhk.or.jp/rss/news/cat2.xml",
            "NHK News",
        ),
        FeedSource::new(
            "sports",
            "スポーツ",
            "https://www3.nhk.or.jp/rss/news/cat7.xml",
            "NHK News",
        ),
        FeedSource::new(
            "it",
            "IT",
            "https://news.yahoo.co.jp/rss/topics/it.xml",
            "Yahoo News",
        ),
        FeedSource::new(
            "science",
            "科学",
            "https://news.yahoo.co.jp/rss/topics/science.xml",
            "Yahoo News",
        ),
    ]
}

/// Ordered, immutable list of feed sources for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: Vec<FeedSource>,
}

impl FeedRegistry {
    pub fn new(feeds: Vec<FeedSource>) -> Self {
        Self { feeds }
    }

    pub fn list_feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn find_feed(&self, id: &str) -> Result<&FeedSource, RegistryError> {
        self.feeds
            .iter()
            .find(|feed| feed.id == id)
            .ok_or_else(|| RegistryError::SourceNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::new(default_feeds())
    }
}
