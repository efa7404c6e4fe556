use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::to_fts_query;
use crate::config::ArchiveConfig;
use crate::models::{permalink, truncate_chars, OutlineNode, SearchPage, SearchResult};
use crate::storage::{Connection, DocumentRepository, NodeRepository, RecentFilter, TextScope};
use crate::tree::Navigator;
use crate::{Error, Result};

/// Where a search looks, as named by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Corpus,
    /// Document id, title or filename
    Document(String),
    /// Descendants of a node; the node itself only with `include_root`
    Subtree {
        document: Option<String>,
        node_id: String,
        #[serde(default)]
        include_root: bool,
    },
}

/// Filters of a recent-changes listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentQuery {
    pub document: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Scoped, paginated queries over the archive.
pub struct SearchEngine<'a> {
    conn: &'a Connection,
    config: &'a ArchiveConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(conn: &'a Connection, config: &'a ArchiveConfig) -> Self {
        Self { conn, config }
    }

    /// Translate a caller scope into a row restriction, checking that its
    /// target exists
    pub fn resolve_scope(&self, scope: &SearchScope) -> Result<TextScope> {
        match scope {
            SearchScope::Corpus => Ok(TextScope::Corpus),
            SearchScope::Document(name) => {
                let document = DocumentRepository::resolve(self.conn, name).map_err(into_scope_error)?;
                Ok(TextScope::Document(document.file_id))
            }
            SearchScope::Subtree {
                document,
                node_id,
                include_root,
            } => {
                let (_, node) = Navigator::new(self.conn, self.config)
                    .resolve_node(document.as_deref(), node_id)
                    .map_err(into_scope_error)?;
                Ok(TextScope::Subtree {
                    document_id: node.document_id,
                    path: node.path,
                    include_root: *include_root,
                })
            }
        }
    }

    /// Full-text search ranked by relevance.
    ///
    /// `limit` defaults to `default_search_limit` and is clamped to
    /// `1..=max_search_limit`. A query with nothing searchable in it yields an
    /// empty page.
    pub fn search(&self, query: &str, scope: &SearchScope, limit: Option<usize>, offset: usize) -> Result<SearchPage> {
        // Count, page and breadcrumbs all read one snapshot
        let _snapshot = self.conn.unchecked_transaction()?;
        let text_scope = self.resolve_scope(scope)?;
        let Some(fts_query) = to_fts_query(query) else {
            return Ok(SearchPage::empty());
        };
        let limit = self.config.search_limit(limit);

        let total = NodeRepository::count_search(self.conn, &fts_query, &text_scope)?;
        tracing::debug!("Search {:?} matched {} nodes", fts_query, total);
        if offset >= total {
            return Ok(SearchPage::new(Vec::new(), total, offset));
        }
        let hits = NodeRepository::search(self.conn, &fts_query, &text_scope, limit, offset)?;

        let results = hits
            .into_iter()
            .map(|hit| self.to_result(hit.node, hit.document_title, Some(hit.snippet)))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchPage::new(results, total, offset))
    }

    /// Nodes ordered by modification time, newest first.
    ///
    /// `limit` is clamped to `1..=max_recent_limit`; pagination follows the
    /// same contract as [`search`](Self::search).
    pub fn recent_changes(&self, query: &RecentQuery, limit: Option<usize>, offset: usize) -> Result<SearchPage> {
        let _snapshot = self.conn.unchecked_transaction()?;
        let document_id = match &query.document {
            Some(name) => Some(
                DocumentRepository::resolve(self.conn, name)
                    .map_err(into_scope_error)?
                    .file_id,
            ),
            None => None,
        };
        let filter = RecentFilter {
            document_id,
            since: query.since,
        };
        let limit = self.config.recent_limit(limit);

        let total = NodeRepository::count_recent(self.conn, &filter)?;
        if offset >= total {
            return Ok(SearchPage::new(Vec::new(), total, offset));
        }
        let rows = NodeRepository::get_recent(self.conn, &filter, limit, offset)?;
        let results = rows
            .into_iter()
            .map(|(node, title)| self.to_result(node, title, None))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchPage::new(results, total, offset))
    }

    fn to_result(&self, node: OutlineNode, document_title: String, snippet: Option<String>) -> Result<SearchResult> {
        let breadcrumbs = Navigator::new(self.conn, self.config).breadcrumb_string(&node.document_id, &node.path)?;
        Ok(SearchResult {
            preview: truncate_chars(&node.content, self.config.preview_chars),
            permalink: permalink(&self.config.base_url, &node.document_id, Some(&node)),
            modified: node.modified,
            document_title,
            snippet,
            breadcrumbs,
            node,
        })
    }
}

fn into_scope_error(error: Error) -> Error {
    match error {
        Error::NotFound(message) | Error::InvalidInput(message) => Error::InvalidScope(message),
        other => other,
    }
}
