use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Default page budget for a new search.
pub const DEFAULT_MAX_PAGES: i64 = 20;
/// Inclusive bounds the search form advertises for `max_pages`.
pub const MIN_PAGES: i64 = 1;
pub const MAX_PAGES: i64 = 100;

/// Body of `POST /search`. Every key is always serialized; an empty string
/// means the operator is not applied.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub normal_query: String,
    pub exact_phrase: String,
    pub semantic_query: String,
    pub include_terms: String,
    pub exclude_terms: String,
    pub filetype: String,
    pub site_include: String,
    pub site_exclude: String,
    pub intitle: String,
    pub inurl: String,
    pub start_date: String,
    pub end_date: String,
    pub max_pages: i64,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            normal_query: String::new(),
            exact_phrase: String::new(),
            semantic_query: String::new(),
            include_terms: String::new(),
            exclude_terms: String::new(),
            filetype: String::new(),
            site_include: String::new(),
            site_exclude: String::new(),
            intitle: String::new(),
            inurl: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// One row returned by the search service.
///
/// The service forwards scraper rows verbatim, so every field is optional and
/// keys we do not know about are kept in `extra`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    // Older service builds emit `href` instead of `url`
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub post_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SearchResult {
    /// Date keys in the order they are consulted.
    fn date_candidates(&self) -> [Option<&String>; 3] {
        [
            self.date.as_ref(),
            self.post_date.as_ref(),
            self.published_date.as_ref(),
        ]
    }

    /// Link target: `url`, falling back to the legacy `href`.
    pub fn link(&self) -> Option<&str> {
        non_empty(self.url.as_ref()).or_else(|| non_empty(self.href.as_ref()))
    }

    /// First non-empty of `date`, `post_date`, `published_date`, else `""`.
    pub fn display_date(&self) -> &str {
        self.date_candidates()
            .into_iter()
            .find_map(non_empty)
            .unwrap_or("")
    }

    pub fn description(&self) -> Option<&str> {
        non_empty(self.description.as_ref())
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Rows are untyped on the service side; a non-string value reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// `null` results mean no rows. A row that is not an object still takes its
/// place in the list, with every field missing.
fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<SearchResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap_or_default())
        .collect())
}

/// Success body of `POST /search`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub pages_retrieved: u32,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub results: Vec<SearchResult>,
}

/// Failure body of `POST /search` (any non-2xx status).
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Client-side aggregate shown above the result list.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    pub query: String,
    pub pages_retrieved: u32,
    pub total_results: usize,
}

impl SearchSummary {
    /// `total_results` counts the rows actually received, not anything the
    /// service reports.
    pub fn from_response(response: &SearchResponse) -> Self {
        Self {
            query: response.query.clone(),
            pages_retrieved: response.pages_retrieved,
            total_results: response.results.len(),
        }
    }
}

/// Body of the service's `GET /` health check.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}
