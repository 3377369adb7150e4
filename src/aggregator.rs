//! Fan-out/fan-in over the registered feeds.
//!
//! Every feed is loaded in its own task and the results are joined with a
//! settle-all barrier: a failed, slow or panicking feed is replaced by
//! placeholder items and never takes its siblings down with it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dates::effective_timestamp;
use crate::fetcher::{FetchError, Fetcher};
use crate::image::{HtmlImageExtractor, ImageExtractor};
use crate::normalizer::{normalize, placeholder_items, NewsItem};
use crate::parser::parse_feed;
use crate::registry::{FeedRegistry, FeedSource};
use crate::search::search;

/// Attribution used when every feed failed at once.
pub const GENERAL_SOURCE_LABEL: &str = "総合";

#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<FeedRegistry>,
    fetcher: Fetcher,
    extractor: Arc<dyn ImageExtractor>,
    placeholder_image: String,
}

impl Aggregator {
    pub fn new(
        registry: FeedRegistry,
        fetcher: Fetcher,
        extractor: Arc<dyn ImageExtractor>,
        placeholder_image: impl Into<String>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            fetcher,
            extractor,
            placeholder_image: placeholder_image.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let fetcher = Fetcher::from_config(config)?;
        let extractor = Arc::new(HtmlImageExtractor::new(config.default_image_url.clone()));
        Ok(Self::new(
            FeedRegistry::new(config.feeds.clone()),
            fetcher,
            extractor,
            config.default_image_url.clone(),
        ))
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// Items for a single category. Unknown ids yield an empty list and a
    /// failed fetch yields placeholder items.
    pub async fn fetch_category(&self, feed_id: &str) -> Vec<NewsItem> {
        let source = match self.registry.find_feed(feed_id) {
            Ok(source) => source.clone(),
            Err(e) => {
                info!("{}", e);
                return Vec::new();
            }
        };

        let now = Utc::now();
        match self.load_feed(&source).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to fetch feed '{}': {}", source.id, e);
                placeholder_items(&source.source_label, &self.placeholder_image, now)
            }
        }
    }

    /// Items from every registered feed, newest first.
    pub async fn fetch_all(&self) -> Vec<NewsItem> {
        let sources = self.registry.list_feeds().to_vec();
        if sources.is_empty() {
            return Vec::new();
        }
        info!("Aggregating {} feeds", sources.len());

        let handles = sources.iter().cloned().map(|source| {
            let this = self.clone();
            tokio::spawn(async move { this.load_feed(&source).await })
        });
        let outcomes = join_all(handles).await;

        let now = Utc::now();
        let mut merged = Vec::new();
        let mut succeeded = 0usize;

        for (source, outcome) in sources.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(items)) => {
                    succeeded += 1;
                    merged.extend(items);
                }
                Ok(Err(e)) => {
                    warn!("Failed to fetch feed '{}': {}", source.id, e);
                    merged.extend(placeholder_items(
                        &source.source_label,
                        &self.placeholder_image,
                        now,
                    ));
                }
                Err(e) => {
                    error!("Fetch task for feed '{}' aborted: {}", source.id, e);
                    merged.extend(placeholder_items(
                        &source.source_label,
                        &self.placeholder_image,
                        now,
                    ));
                }
            }
        }

        if succeeded == 0 {
            error!("All {} feeds failed, serving placeholder news", sources.len());
            return placeholder_items(GENERAL_SOURCE_LABEL, &self.placeholder_image, now);
        }

        sort_by_recency(&mut merged, now);
        info!(
            "Aggregated {} items from {}/{} feeds",
            merged.len(),
            succeeded,
            sources.len()
        );
        merged
    }

    /// Searches a fresh aggregation; results always reflect a live refetch.
    pub async fn search(&self, query: &str) -> Vec<NewsItem> {
        let corpus = self.fetch_all().await;
        search(query, &corpus)
    }

    async fn load_feed(&self, source: &FeedSource) -> Result<Vec<NewsItem>, FetchError> {
        // The client timeout covers the request; this bounds the whole fetch.
        let document = tokio::time::timeout(self.fetcher.timeout(), self.fetcher.fetch(source))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let now = Utc::now();
        let items: Vec<NewsItem> = parse_feed(&document)
            .into_iter()
            .map(|entry| normalize(entry, source, self.extractor.as_ref(), now))
            .collect();

        info!("Loaded {} items for feed '{}'", items.len(), source.id);
        Ok(items)
    }
}

/// Stable sort, newest first. Unparsable dates count as `now`.
pub fn sort_by_recency(items: &mut [NewsItem], now: DateTime<Utc>) {
    items.sort_by_cached_key(|item| std::cmp::Reverse(effective_timestamp(&item.pub_date, now)));
}
