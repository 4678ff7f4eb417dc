use crate::config::ClientConfig;
use crate::types::*;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Shown when the service gives no usable `detail`.
pub const FALLBACK_ERROR_MESSAGE: &str = "Search failed. Please try again.";

/// The only failure a search can have. Network errors, non-2xx statuses and
/// unreadable bodies all end up here, with whatever detail the service sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search request failed: {}", .detail.as_deref().unwrap_or(FALLBACK_ERROR_MESSAGE))]
    RequestFailed { detail: Option<String> },
}

impl SearchError {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        SearchError::RequestFailed {
            detail: (!detail.is_empty()).then_some(detail),
        }
    }

    pub fn without_detail() -> Self {
        SearchError::RequestFailed { detail: None }
    }

    /// Text for the error view.
    pub fn message(&self) -> String {
        match self {
            SearchError::RequestFailed { detail } => detail
                .clone()
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
        }
    }
}

/// The remote search service.
pub trait SearchBackend: Send + Sync {
    fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> impl Future<Output = Result<SearchResponse, SearchError>> + Send;

    fn health(&self) -> impl Future<Output = Result<HealthResponse, SearchError>> + Send;
}

/// HTTP client for the scraper API.
#[derive(Clone, Debug)]
pub struct SearchClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http_client,
        }
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(config.api_url.clone(), builder.build()?))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl SearchBackend for SearchClient {
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResponse, SearchError> {
        let search_url = format!("{}/search", self.base_url);
        debug!("Search URL: {}", search_url);

        let resp = self
            .http_client
            .post(&search_url)
            .header("Accept", "application/json")
            .json(criteria)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to send request to search service: {}", e);
                SearchError::without_detail()
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("Search service returned status {}: {}", status, text);
            // FastAPI validation errors carry a list in `detail`; only a string counts
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|body| body.detail);
            return Err(match detail {
                Some(detail) => SearchError::with_detail(detail),
                None => SearchError::without_detail(),
            });
        }

        let parsed = resp.json::<SearchResponse>().await.map_err(|e| {
            warn!("Failed to parse search response: {}", e);
            SearchError::without_detail()
        })?;
        info!(
            "Search service returned {} results from {} pages",
            parsed.results.len(),
            parsed.pages_retrieved
        );
        Ok(parsed)
    }

    async fn health(&self) -> Result<HealthResponse, SearchError> {
        let resp = self
            .http_client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| {
                warn!("Health check failed: {}", e);
                SearchError::without_detail()
            })?;
        if !resp.status().is_success() {
            return Err(SearchError::with_detail(format!(
                "health check returned {}",
                resp.status()
            )));
        }
        resp.json::<HealthResponse>()
            .await
            .map_err(|_| SearchError::without_detail())
    }
}
