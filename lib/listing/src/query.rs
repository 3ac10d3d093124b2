//! List queries.
//!
//! A [`ListQuery`] is immutable; every UI action derives a new one with a
//! builder. Changing the sort, keyword or page size starts over at page 0.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Sort field used when none is configured.
pub const DEFAULT_SORT_FIELD: &str = "id";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Returns the opposite direction.
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Returns the wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a query is paged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationStrategy {
    /// The listing endpoint pages and sorts.
    ServerPaged,
    /// The search endpoint returns every match and the console slices it.
    ClientSlicedFromFullMatch,
}

/// Parameters of one list fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "QueryFields")]
pub struct ListQuery {
    page_index: usize,
    page_size: usize,
    sort_field: String,
    sort_direction: SortDirection,
    keyword: Option<String>,
}

/// Deserialized form of [`ListQuery`], normalized through the builders.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryFields {
    #[serde(default)]
    page_index: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_sort_field")]
    sort_field: String,
    #[serde(default)]
    sort_direction: SortDirection,
    #[serde(default)]
    keyword: Option<String>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_sort_field() -> String {
    DEFAULT_SORT_FIELD.to_string()
}

impl From<QueryFields> for ListQuery {
    fn from(fields: QueryFields) -> Self {
        Self::default()
            .with_sort(fields.sort_field, fields.sort_direction)
            .with_page_size(fields.page_size)
            .with_keyword(fields.keyword.unwrap_or_default())
            .with_page(fields.page_index)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_SORT_FIELD)
    }
}

impl ListQuery {
    /// First page, default size, ascending on `sort_field`, no keyword.
    #[must_use]
    pub fn new(sort_field: impl Into<String>) -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            sort_field: sort_field.into(),
            sort_direction: SortDirection::Asc,
            keyword: None,
        }
    }

    #[must_use]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// Returns the search keyword, if any. Never blank.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Selects the paging strategy: a keyword forces client slicing.
    #[must_use]
    pub fn strategy(&self) -> PaginationStrategy {
        if self.keyword.is_some() {
            PaginationStrategy::ClientSlicedFromFullMatch
        } else {
            PaginationStrategy::ServerPaged
        }
    }

    /// Moves to `page_index`.
    #[must_use]
    pub fn with_page(mut self, page_index: usize) -> Self {
        self.page_index = page_index;
        self
    }

    #[must_use]
    pub fn next_page(self) -> Self {
        let next = self.page_index.saturating_add(1);
        self.with_page(next)
    }

    /// Moves back one page, stopping at the first.
    #[must_use]
    pub fn previous_page(self) -> Self {
        let previous = self.page_index.saturating_sub(1);
        self.with_page(previous)
    }

    /// Changes the page size (at least 1) and returns to the first page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self.page_index = 0;
        self
    }

    /// Sorts by `field` in `direction` and returns to the first page.
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = field.into();
        self.sort_direction = direction;
        self.page_index = 0;
        self
    }

    /// Column-header click: flips the direction on the current field,
    /// otherwise sorts ascending on the new one.
    #[must_use]
    pub fn toggle_sort(self, field: &str) -> Self {
        let direction = if self.sort_field == field {
            self.sort_direction.reversed()
        } else {
            SortDirection::Asc
        };
        self.with_sort(field, direction)
    }

    /// Sets the search keyword and returns to the first page. A blank
    /// keyword clears the search.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        let trimmed = keyword.trim();
        self.keyword = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self.page_index = 0;
        self
    }

    /// Clears the search keyword and returns to the first page.
    #[must_use]
    pub fn without_keyword(self) -> Self {
        self.with_keyword("")
    }

    /// Pulls the page index back inside `total_pages`.
    #[must_use]
    pub fn clamped_to(self, total_pages: usize) -> Self {
        let last = total_pages.saturating_sub(1);
        if self.page_index > last {
            self.with_page(last)
        } else {
            self
        }
    }

    /// Query parameters of the listing endpoint.
    #[must_use]
    pub fn listing_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pageIndex", self.page_index.to_string()),
            ("pageSize", self.page_size.to_string()),
            ("sortField", self.sort_field.clone()),
            ("sortDirection", self.sort_direction.to_string()),
        ]
    }
}
