use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::dates::{format_date, relative_time};
use crate::normalizer::NewsItem;
use crate::registry::FeedSource;
use crate::search::{filter_by_category, paginate, DEFAULT_PAGE_SIZE};

pub const API_VERSION: &str = "1.0.0";
const ENDPOINTS: [&str; 4] = [
    "GET /api/feeds",
    "GET /api/news",
    "GET /api/news/search",
    "GET /api/health",
];

pub struct AppState {
    pub aggregator: Aggregator,
    pub stats: ApiStats,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            stats: ApiStats::default(),
            started_at: Instant::now(),
        }
    }
}

/// Request counters reported by the health endpoint.
#[derive(Debug, Default)]
pub struct ApiStats {
    requests: AtomicU64,
    successes: AtomicU64,
    total_response_ms: AtomicU64,
}

impl ApiStats {
    pub fn record(&self, started: Instant, success: bool) {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
        self.total_response_ms.fetch_add(elapsed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Performance {
        let requests = self.requests.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let total_ms = self.total_response_ms.load(Ordering::Relaxed);

        let (average_response_time, success_rate) = if requests == 0 {
            (0, 100.0)
        } else {
            let rate = successes as f64 / requests as f64 * 100.0;
            (total_ms / requests, (rate * 100.0).round() / 100.0)
        };

        Performance {
            average_response_time,
            total_requests: requests,
            success_rate,
        }
    }
}

/// Envelope shared by every `/api` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
    pub version: String,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_rfc3339(),
            version: API_VERSION.to_string(),
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: now_rfc3339(),
            version: API_VERSION.to_string(),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArticle {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub summary: String,
    pub source: String,
    pub category: String,
    pub image_url: String,
    pub display_date: Option<String>,
    pub relative_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub articles: Vec<SearchArticle>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
    pub query: String,
    /// Milliseconds spent refetching and filtering
    pub search_time: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub average_response_time: u64,
    pub total_requests: u64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    /// Milliseconds since startup
    pub uptime: u64,
    pub version: String,
    pub endpoints: Vec<String>,
    pub last_updated: String,
    pub performance: Performance,
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    pub category: Option<String>,
}

/// Paging values stay strings so malformed input falls back instead of
/// rejecting the request outside the response envelope.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub category: Option<String>,
}

impl SearchQuery {
    pub fn page(&self) -> usize {
        lenient_count(self.page.as_deref(), 1)
    }

    pub fn limit(&self) -> usize {
        lenient_count(self.limit.as_deref(), DEFAULT_PAGE_SIZE)
    }
}

/// Non-numeric input gives `default`; values below 1 clamp to 1.
fn lenient_count(raw: Option<&str>, default: usize) -> usize {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => default,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n < 1 => 1,
            Ok(n) => usize::try_from(n).unwrap_or(usize::MAX),
            Err(_) => default,
        },
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/feeds", get(list_feeds))
        .route("/api/news", get(news))
        .route("/api/news/search", get(search_news))
        .route("/api/health", get(api_health))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Route handlers
pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<FeedSource>>> {
    let started = Instant::now();
    let feeds = state.aggregator.registry().list_feeds().to_vec();
    state.stats.record(started, true);
    Json(ApiResponse::ok(feeds))
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Json<ApiResponse<Vec<NewsItem>>> {
    let started = Instant::now();
    let items = match query.category.as_deref() {
        None | Some("") | Some("all") => state.aggregator.fetch_all().await,
        Some(category) => state.aggregator.fetch_category(category).await,
    };
    state.stats.record(started, true);
    Json(ApiResponse::ok(items))
}

pub async fn search_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let started = Instant::now();

    let q = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => {
            state.stats.record(started, false);
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<SearchResult>::failure("検索クエリ(q)が必要です")),
            );
        }
    };

    let mut results = state.aggregator.search(&q).await;
    if let Some(category) = query.category.as_deref() {
        results = filter_by_category(results, category, state.aggregator.registry());
    }

    let page = paginate(results, query.page(), query.limit());

    let category_label = query.category.clone().unwrap_or_else(|| "すべて".to_string());
    let now = Utc::now();
    let local_now = Local::now().fixed_offset();
    let articles = page
        .items
        .into_iter()
        .map(|item| SearchArticle {
            display_date: format_date(&item.pub_date, local_now),
            relative_time: relative_time(&item.pub_date, now),
            id: item.id,
            title: item.title,
            url: item.link,
            published_at: item.pub_date,
            summary: item.content_snippet,
            source: item.source,
            category: category_label.clone(),
            image_url: item.image_url,
        })
        .collect();

    let search_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!("Search '{}' matched {} items in {}ms", q, page.total, search_time);
    state.stats.record(started, true);

    (
        StatusCode::OK,
        Json(ApiResponse::ok(SearchResult {
            articles,
            total: page.total,
            page: page.page,
            limit: page.limit,
            has_more: page.has_more,
            query: q,
            search_time,
        })),
    )
}

pub async fn api_health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthStatus>> {
    let started = Instant::now();

    let items = state.aggregator.fetch_all().await;
    let live = items.iter().any(|item| !item.is_placeholder());
    state.stats.record(started, live);

    let status = HealthStatus {
        status: if live { "healthy" } else { "degraded" }.to_string(),
        uptime: u64::try_from(state.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        version: API_VERSION.to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        last_updated: now_rfc3339(),
        performance: state.stats.snapshot(),
    };

    Json(ApiResponse::ok(status))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
