use crate::normalizer::NewsItem;
use crate::registry::FeedRegistry;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Keeps the items of `corpus` matching every whitespace-separated term.
///
/// A term matches when it is a case-insensitive substring of the title or
/// the snippet. Relative order is preserved. A query without terms matches
/// nothing; callers are expected to skip blank queries entirely.
pub fn search(query: &str, corpus: &[NewsItem]) -> Vec<NewsItem> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Vec::new();
    }

    corpus
        .iter()
        .filter(|item| matches_all(item, &terms))
        .cloned()
        .collect()
}

fn matches_all(item: &NewsItem, terms: &[String]) -> bool {
    let title = item.title.to_lowercase();
    let snippet = item.content_snippet.to_lowercase();
    terms
        .iter()
        .all(|term| title.contains(term.as_str()) || snippet.contains(term.as_str()))
}

/// Restricts results to the source label of category `category_id`.
///
/// `all` and unknown ids leave the results untouched.
pub fn filter_by_category(
    results: Vec<NewsItem>,
    category_id: &str,
    registry: &FeedRegistry,
) -> Vec<NewsItem> {
    if category_id == "all" {
        return results;
    }
    match registry.find_feed(category_id) {
        Ok(feed) => results
            .into_iter()
            .filter(|item| item.source == feed.source_label)
            .collect(),
        Err(_) => results,
    }
}

/// One page of a result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// 1-based pagination; `page` and `limit` below 1 are clamped to 1.
pub fn paginate<T>(results: Vec<T>, page: usize, limit: usize) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = results.len();
    let start = (page - 1).saturating_mul(limit);
    let end = start.saturating_add(limit);

    let items = results.into_iter().skip(start).take(limit).collect();

    Page {
        items,
        total,
        page,
        limit,
        has_more: end < total,
    }
}
