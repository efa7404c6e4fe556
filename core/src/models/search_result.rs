use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OutlineNode;

/// A search or recent-changes hit with display context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub node: OutlineNode,
    pub document_title: String,
    pub preview: String,
    pub snippet: Option<String>,
    pub permalink: String,
    pub modified: DateTime<Utc>,
    pub breadcrumbs: String,
}

/// One page of ranked results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

impl SearchPage {
    /// Build a page, deriving `has_more` and `next_offset` from its position
    pub fn new(results: Vec<SearchResult>, total: usize, offset: usize) -> Self {
        let end = offset.saturating_add(results.len());
        let has_more = end < total;
        Self {
            results,
            total,
            has_more,
            next_offset: has_more.then_some(end),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_page() {
        let page = SearchPage::new(Vec::new(), 0, 0);
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn test_offset_past_end_has_no_more() {
        let page = SearchPage::new(Vec::new(), 3, 10);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);

        let page = SearchPage::new(Vec::new(), 3, usize::MAX);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }
}
