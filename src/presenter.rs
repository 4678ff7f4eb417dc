//! Turns a [`SearchState`] into something to show.

use crate::state::SearchState;
use crate::types::{SearchResult, SearchSummary};
use std::str::FromStr;
use url::Url;

pub const UNTITLED: &str = "Untitled";
pub const NO_URL: &str = "No URL";
pub const NO_QUERY: &str = "No query specified";

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Loading,
    Error(String),
    /// Nothing to show; renders as no output at all.
    Empty,
    Results(ResultsView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub summary: Option<SearchSummary>,
    pub rows: Vec<ResultRow>,
    /// Rows hidden by the active filter.
    pub hidden: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    /// 1-based position in the received sequence.
    pub position: usize,
    pub key: String,
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    pub host: String,
    pub date: String,
}

impl ResultRow {
    fn from_result(index: usize, result: &SearchResult) -> Self {
        Self {
            position: index + 1,
            key: row_key(index, result),
            title: result
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(UNTITLED)
                .to_string(),
            link: result.link().map(str::to_string),
            description: result.description().map(str::to_string),
            host: display_host(result.link()),
            date: result.display_date().to_string(),
        }
    }
}

/// Hostname for display; never fails.
pub fn display_host(link: Option<&str>) -> String {
    link.and_then(|l| Url::parse(l).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| NO_URL.to_string())
}

/// Stable list key: the link when there is one, else the position.
pub fn row_key(index: usize, result: &SearchResult) -> String {
    result
        .link()
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterColumn {
    Title,
    Date,
    Url,
}

impl FromStr for FilterColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(FilterColumn::Title),
            "date" => Ok(FilterColumn::Date),
            "url" => Ok(FilterColumn::Url),
            other => Err(format!("unknown filter column '{}'", other)),
        }
    }
}

/// Case-insensitive substring filters over the displayed rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub title: String,
    pub date: String,
    pub url: String,
}

impl ResultFilter {
    pub fn set(&mut self, column: FilterColumn, text: &str) {
        let slot = match column {
            FilterColumn::Title => &mut self.title,
            FilterColumn::Date => &mut self.date,
            FilterColumn::Url => &mut self.url,
        };
        *slot = text.to_lowercase();
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.date.is_empty() && self.url.is_empty()
    }

    fn matches(&self, row: &ResultRow) -> bool {
        let contains = |haystack: &str, needle: &str| {
            needle.is_empty() || haystack.to_lowercase().contains(needle)
        };
        contains(&row.title, &self.title)
            && contains(&row.date, &self.date)
            && contains(row.link.as_deref().unwrap_or(""), &self.url)
    }
}

pub fn present(state: &SearchState) -> View {
    present_filtered(state, &ResultFilter::default())
}

/// Loading beats error, error beats results, and no results is no output.
pub fn present_filtered(state: &SearchState, filter: &ResultFilter) -> View {
    if state.loading {
        return View::Loading;
    }
    if let Some(message) = &state.error {
        return View::Error(message.clone());
    }
    if state.results.is_empty() {
        return View::Empty;
    }

    let all: Vec<ResultRow> = state
        .results
        .iter()
        .enumerate()
        .map(|(i, r)| ResultRow::from_result(i, r))
        .collect();
    let total = all.len();
    let rows: Vec<ResultRow> = all.into_iter().filter(|row| filter.matches(row)).collect();
    View::Results(ResultsView {
        summary: state.summary.clone(),
        hidden: total - rows.len(),
        rows,
    })
}

/// Terminal rendering of a view.
pub fn render(view: &View) -> String {
    match view {
        View::Loading => {
            "Searching DuckDuckGo...\nThis may take a few moments while we gather results\n"
                .to_string()
        }
        View::Error(message) => format!("Search Error\n{}\n", message),
        View::Empty => String::new(),
        View::Results(results) => render_results(results),
    }
}

fn render_results(view: &ResultsView) -> String {
    let mut text = String::new();
    if let Some(summary) = &view.summary {
        let query = if summary.query.is_empty() {
            NO_QUERY
        } else {
            summary.query.as_str()
        };
        text.push_str(&format!(
            "Search Summary\n  Results Found: {}\n  Pages Scraped: {}\n  Search Query:  {}\n\n",
            summary.total_results, summary.pages_retrieved, query
        ));
    }

    text.push_str(&format!("Search Results ({})\n", view.rows.len()));
    for row in &view.rows {
        text.push_str(&format!(
            "{}. **{}**\n   URL: {}\n",
            row.position,
            row.title,
            row.link.as_deref().unwrap_or("")
        ));
        if let Some(description) = &row.description {
            text.push_str(&format!("   {}\n", description));
        }
        if row.date.is_empty() {
            text.push_str(&format!("   {}\n", row.host));
        } else {
            text.push_str(&format!("   {} | {}\n", row.host, row.date));
        }
    }
    if view.hidden > 0 {
        text.push_str(&format!("({} hidden by filters)\n", view.hidden));
    }
    text.push_str(&format!("Showing {} results\n", view.rows.len()));
    text
}
