//! Search form state: the criteria being edited and the rules for handing a
//! snapshot of it to whoever issues the request.

use crate::types::{SearchCriteria, MAX_PAGES, MIN_PAGES};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Every editable field of [`SearchCriteria`], named by its wire key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriteriaField {
    NormalQuery,
    ExactPhrase,
    SemanticQuery,
    IncludeTerms,
    ExcludeTerms,
    Filetype,
    SiteInclude,
    SiteExclude,
    InTitle,
    InUrl,
    StartDate,
    EndDate,
    MaxPages,
}

impl CriteriaField {
    pub const ALL: [CriteriaField; 13] = [
        CriteriaField::NormalQuery,
        CriteriaField::ExactPhrase,
        CriteriaField::SemanticQuery,
        CriteriaField::IncludeTerms,
        CriteriaField::ExcludeTerms,
        CriteriaField::Filetype,
        CriteriaField::SiteInclude,
        CriteriaField::SiteExclude,
        CriteriaField::InTitle,
        CriteriaField::InUrl,
        CriteriaField::StartDate,
        CriteriaField::EndDate,
        CriteriaField::MaxPages,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CriteriaField::NormalQuery => "normal_query",
            CriteriaField::ExactPhrase => "exact_phrase",
            CriteriaField::SemanticQuery => "semantic_query",
            CriteriaField::IncludeTerms => "include_terms",
            CriteriaField::ExcludeTerms => "exclude_terms",
            CriteriaField::Filetype => "filetype",
            CriteriaField::SiteInclude => "site_include",
            CriteriaField::SiteExclude => "site_exclude",
            CriteriaField::InTitle => "intitle",
            CriteriaField::InUrl => "inurl",
            CriteriaField::StartDate => "start_date",
            CriteriaField::EndDate => "end_date",
            CriteriaField::MaxPages => "max_pages",
        }
    }

    pub fn is_date(self) -> bool {
        matches!(self, CriteriaField::StartDate | CriteriaField::EndDate)
    }

    fn text_slot(self, criteria: &mut SearchCriteria) -> Option<&mut String> {
        let slot = match self {
            CriteriaField::NormalQuery => &mut criteria.normal_query,
            CriteriaField::ExactPhrase => &mut criteria.exact_phrase,
            CriteriaField::SemanticQuery => &mut criteria.semantic_query,
            CriteriaField::IncludeTerms => &mut criteria.include_terms,
            CriteriaField::ExcludeTerms => &mut criteria.exclude_terms,
            CriteriaField::Filetype => &mut criteria.filetype,
            CriteriaField::SiteInclude => &mut criteria.site_include,
            CriteriaField::SiteExclude => &mut criteria.site_exclude,
            CriteriaField::InTitle => &mut criteria.intitle,
            CriteriaField::InUrl => &mut criteria.inurl,
            CriteriaField::StartDate => &mut criteria.start_date,
            CriteriaField::EndDate => &mut criteria.end_date,
            CriteriaField::MaxPages => return None,
        };
        Some(slot)
    }

    /// Current value of this field rendered as text.
    pub fn value_of(self, criteria: &SearchCriteria) -> String {
        match self {
            CriteriaField::NormalQuery => criteria.normal_query.clone(),
            CriteriaField::ExactPhrase => criteria.exact_phrase.clone(),
            CriteriaField::SemanticQuery => criteria.semantic_query.clone(),
            CriteriaField::IncludeTerms => criteria.include_terms.clone(),
            CriteriaField::ExcludeTerms => criteria.exclude_terms.clone(),
            CriteriaField::Filetype => criteria.filetype.clone(),
            CriteriaField::SiteInclude => criteria.site_include.clone(),
            CriteriaField::SiteExclude => criteria.site_exclude.clone(),
            CriteriaField::InTitle => criteria.intitle.clone(),
            CriteriaField::InUrl => criteria.inurl.clone(),
            CriteriaField::StartDate => criteria.start_date.clone(),
            CriteriaField::EndDate => criteria.end_date.clone(),
            CriteriaField::MaxPages => criteria.max_pages.to_string(),
        }
    }
}

impl fmt::Display for CriteriaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown field '{0}'")]
pub struct ParseFieldError(pub String);

impl FromStr for CriteriaField {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CriteriaField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| ParseFieldError(s.to_string()))
    }
}

/// What happens to a `max_pages` value outside `[1, 100]` at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageBoundsPolicy {
    /// Send the value as entered.
    #[default]
    Advisory,
    /// Clamp the submitted snapshot into range.
    Clamp,
    /// Refuse to submit.
    Reject,
}

impl FromStr for PageBoundsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(PageBoundsPolicy::Advisory),
            "clamp" => Ok(PageBoundsPolicy::Clamp),
            "reject" => Ok(PageBoundsPolicy::Reject),
            other => Err(format!(
                "invalid page policy '{}': expected advisory, clamp or reject",
                other
            )),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{field} must be a whole number, got '{value}'")]
    InvalidNumber { field: CriteriaField, value: String },
    #[error("max_pages must be between 1 and 100, got {0}")]
    PagesOutOfRange(i64),
}

/// Editable search criteria.
#[derive(Debug, Clone, Default)]
pub struct SearchForm {
    criteria: SearchCriteria,
    policy: PageBoundsPolicy,
}

impl SearchForm {
    pub fn new(policy: PageBoundsPolicy) -> Self {
        Self {
            criteria: SearchCriteria::default(),
            policy,
        }
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn policy(&self) -> PageBoundsPolicy {
        self.policy
    }

    /// Set exactly one field. Text fields take the value verbatim; `max_pages`
    /// must parse as an integer but is not range-checked here.
    pub fn update(&mut self, field: CriteriaField, value: &str) -> Result<(), FormError> {
        if field == CriteriaField::MaxPages {
            self.criteria.max_pages =
                value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| FormError::InvalidNumber {
                        field,
                        value: value.to_string(),
                    })?;
        } else if let Some(slot) = field.text_slot(&mut self.criteria) {
            *slot = value.to_string();
        }
        debug!("form field {} updated", field);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.criteria = SearchCriteria::default();
    }

    /// Hand an immutable snapshot of the current criteria to `on_submit`.
    ///
    /// Only [`PageBoundsPolicy::Reject`] can fail; the callback is not invoked
    /// in that case.
    pub fn submit<F>(&self, on_submit: F) -> Result<(), FormError>
    where
        F: FnOnce(SearchCriteria),
    {
        on_submit(self.snapshot()?);
        Ok(())
    }

    /// The criteria as they would be submitted under the current policy.
    pub fn snapshot(&self) -> Result<SearchCriteria, FormError> {
        let mut snapshot = self.criteria.clone();
        let in_range = (MIN_PAGES..=MAX_PAGES).contains(&snapshot.max_pages);
        match self.policy {
            PageBoundsPolicy::Advisory => {}
            PageBoundsPolicy::Clamp => {
                snapshot.max_pages = snapshot.max_pages.clamp(MIN_PAGES, MAX_PAGES);
            }
            PageBoundsPolicy::Reject if !in_range => {
                return Err(FormError::PagesOutOfRange(snapshot.max_pages));
            }
            PageBoundsPolicy::Reject => {}
        }
        Ok(snapshot)
    }
}
