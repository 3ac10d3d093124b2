//! One page of list results.

use serde::{Deserialize, Serialize};

/// A page of records as the listing endpoint reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Records on this page.
    pub content: Vec<T>,
    /// Number of pages in the whole result set.
    pub total_pages: usize,
    /// Zero-based index of this page.
    pub page_index: usize,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Page<T> {
    /// An empty first page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            content: Vec::new(),
            total_pages: 0,
            page_index: 0,
        }
    }

    /// Cuts page `page_index` of `page_size` out of the full match list.
    ///
    /// `total_pages` is `ceil(matches / page_size)`; an index past the end
    /// yields an empty page that still reports the real page count.
    #[must_use]
    pub fn client_sliced(matches: Vec<T>, page_index: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = matches.len().div_ceil(page_size);
        let start = page_index.saturating_mul(page_size);
        let content = matches.into_iter().skip(start).take(page_size).collect();
        Self {
            content,
            total_pages,
            page_index,
        }
    }

    /// Returns true if the page index lies past the last page of a
    /// non-empty result set.
    #[must_use]
    pub fn is_past_end(&self) -> bool {
        self.total_pages > 0 && self.page_index >= self.total_pages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page_index + 1 < self.total_pages
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page_index > 0
    }
}
