use crate::models::{datetime_to_millis, millis_to_datetime, path_ids, OutlineNode};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

pub struct NodeRepository;

const NODE_COLUMNS: &str = "n.id, n.document_id, n.parent_id, n.content, n.note, n.created, n.modified, \
     n.sort_order, n.depth, n.path, n.checked, n.color, n.child_count";

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<OutlineNode> {
    let note: String = row.get(4)?;
    Ok(OutlineNode {
        id: row.get(0)?,
        document_id: row.get(1)?,
        parent_id: row.get(2)?,
        content: row.get(3)?,
        note: if note.is_empty() { None } else { Some(note) },
        created: millis_to_datetime(row.get(5)?),
        modified: millis_to_datetime(row.get(6)?),
        sort_order: row.get(7)?,
        depth: row.get(8)?,
        path: row.get(9)?,
        checked: row.get(10)?,
        color: row.get(11)?,
        child_count: row.get(12)?,
    })
}

/// Row restriction applied to a text query.
#[derive(Debug, Clone, PartialEq)]
pub enum TextScope {
    Corpus,
    Document(String),
    /// Descendants of the node at `path`; the node itself only with `include_root`
    Subtree {
        document_id: String,
        path: String,
        include_root: bool,
    },
}

impl TextScope {
    fn push_predicates(&self, sql: &mut String, values: &mut Vec<Value>) {
        match self {
            TextScope::Corpus => {}
            TextScope::Document(document_id) => {
                sql.push_str(" AND n.document_id = ?");
                values.push(Value::Text(document_id.clone()));
            }
            TextScope::Subtree { document_id, path, include_root } => {
                sql.push_str(" AND n.document_id = ?");
                values.push(Value::Text(document_id.clone()));
                push_subtree_predicate(sql, values, path, *include_root);
            }
        }
    }
}

/// `substr` instead of LIKE so ids containing `%` or `_` stay literal
fn push_subtree_predicate(sql: &mut String, values: &mut Vec<Value>, path: &str, include_root: bool) {
    let prefix = format!("{}/", path);
    if include_root {
        sql.push_str(" AND (n.path = ? OR substr(n.path, 1, ?) = ?)");
        values.push(Value::Text(path.to_string()));
    } else {
        sql.push_str(" AND substr(n.path, 1, ?) = ?");
    }
    values.push(Value::Integer(prefix.chars().count() as i64));
    values.push(Value::Text(prefix));
}

/// One full-text match as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TextHit {
    pub node: OutlineNode,
    pub document_title: String,
    pub snippet: String,
    pub score: f64,
}

/// Filter for modification-ordered listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentFilter {
    pub document_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl RecentFilter {
    fn where_sql(&self, values: &mut Vec<Value>) -> String {
        let mut sql = String::from("WHERE 1 = 1");
        if let Some(document_id) = &self.document_id {
            sql.push_str(" AND n.document_id = ?");
            values.push(Value::Text(document_id.clone()));
        }
        if let Some(since) = &self.since {
            sql.push_str(" AND n.modified >= ?");
            values.push(Value::Integer(datetime_to_millis(since)));
        }
        sql
    }
}

impl NodeRepository {
    /// Get a node by document and id
    pub fn get(conn: &Connection, document_id: &str, id: &str) -> Result<OutlineNode> {
        let sql = format!("SELECT {} FROM nodes n WHERE n.document_id = ?1 AND n.id = ?2", NODE_COLUMNS);
        conn.query_row(&sql, params![document_id, id], row_to_node)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Node not found: {} in document {}", id, document_id)))
    }

    /// Get every node with the given id, across all documents
    pub fn find_by_id(conn: &Connection, id: &str) -> Result<Vec<OutlineNode>> {
        let sql = format!("SELECT {} FROM nodes n WHERE n.id = ?1 ORDER BY n.document_id", NODE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![id], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    /// Get child nodes of a parent in sibling order, optionally capped
    pub fn get_children(
        conn: &Connection,
        document_id: &str,
        parent_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<OutlineNode>> {
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.document_id = ?1 AND n.parent_id = ?2
             ORDER BY n.sort_order LIMIT ?3",
            NODE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![document_id, parent_id, sql_limit(limit)], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    /// Get the nodes named by a materialized path, root first.
    ///
    /// Parsed from the path and fetched in one batch, so the cost follows the
    /// depth of the node rather than the size of the tree.
    pub fn get_ancestors(conn: &Connection, document_id: &str, path: &str) -> Result<Vec<OutlineNode>> {
        let ids = path_ids(path);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.document_id = ? AND n.id IN ({}) ORDER BY n.depth",
            NODE_COLUMNS, placeholders
        );
        let values = std::iter::once(document_id).chain(ids.iter().copied());
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params_from_iter(values), row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    /// Get a node and its descendants down to `max_depth` (absolute), ordered
    /// by depth then sibling position
    pub fn get_subtree(
        conn: &Connection,
        document_id: &str,
        path: &str,
        max_depth: Option<u32>,
    ) -> Result<Vec<OutlineNode>> {
        let mut sql = format!("SELECT {} FROM nodes n WHERE n.document_id = ?", NODE_COLUMNS);
        let mut values = vec![Value::Text(document_id.to_string())];
        push_subtree_predicate(&mut sql, &mut values, path, true);
        if let Some(max_depth) = max_depth {
            sql.push_str(" AND n.depth <= ?");
            values.push(Value::Integer(i64::from(max_depth)));
        }
        sql.push_str(" ORDER BY n.depth, n.parent_id, n.sort_order");

        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params_from_iter(values), row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    /// Get up to `count` siblings on each side of a position, in sibling order
    pub fn get_siblings(
        conn: &Connection,
        document_id: &str,
        parent_id: &str,
        sort_order: u32,
        count: usize,
    ) -> Result<(Vec<OutlineNode>, Vec<OutlineNode>)> {
        let before_sql = format!(
            "SELECT {} FROM nodes n WHERE n.document_id = ?1 AND n.parent_id = ?2 AND n.sort_order < ?3
             ORDER BY n.sort_order DESC LIMIT ?4",
            NODE_COLUMNS
        );
        let after_sql = format!(
            "SELECT {} FROM nodes n WHERE n.document_id = ?1 AND n.parent_id = ?2 AND n.sort_order > ?3
             ORDER BY n.sort_order LIMIT ?4",
            NODE_COLUMNS
        );
        let count = count as i64;

        let mut stmt = conn.prepare(&before_sql)?;
        let mut before = stmt
            .query_map(params![document_id, parent_id, sort_order, count], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        before.reverse();

        let mut stmt = conn.prepare(&after_sql)?;
        let after = stmt
            .query_map(params![document_id, parent_id, sort_order, count], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((before, after))
    }

    /// Run an FTS5 query, ranked by relevance, then newest first, then id
    pub fn search(
        conn: &Connection,
        fts_query: &str,
        scope: &TextScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TextHit>> {
        let mut sql = format!(
            "SELECT {}, d.title, snippet(nodes_fts, -1, '**', '**', '...', 16), bm25(nodes_fts) AS score
             FROM nodes_fts
             JOIN nodes n ON n.rowid = nodes_fts.rowid
             JOIN documents d ON d.file_id = n.document_id
             WHERE nodes_fts MATCH ?",
            NODE_COLUMNS
        );
        let mut values = vec![Value::Text(fts_query.to_string())];
        scope.push_predicates(&mut sql, &mut values);
        sql.push_str(" ORDER BY score, n.modified DESC, n.id, n.document_id LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(sql_offset(offset)));

        let mut stmt = conn.prepare(&sql)?;
        let hits = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(TextHit {
                    node: row_to_node(row)?,
                    document_title: row.get(13)?,
                    snippet: row.get(14)?,
                    score: row.get(15)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    /// Count all matches of an FTS5 query within a scope
    pub fn count_search(conn: &Connection, fts_query: &str, scope: &TextScope) -> Result<usize> {
        let mut sql = String::from(
            "SELECT COUNT(*) FROM nodes_fts
             JOIN nodes n ON n.rowid = nodes_fts.rowid
             WHERE nodes_fts MATCH ?",
        );
        let mut values = vec![Value::Text(fts_query.to_string())];
        scope.push_predicates(&mut sql, &mut values);

        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get nodes ordered by modification time, newest first, with document titles
    pub fn get_recent(
        conn: &Connection,
        filter: &RecentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<(OutlineNode, String)>> {
        let mut values = Vec::new();
        let where_sql = filter.where_sql(&mut values);
        let sql = format!(
            "SELECT {}, d.title FROM nodes n JOIN documents d ON d.file_id = n.document_id
             {} ORDER BY n.modified DESC, n.id, n.document_id LIMIT ? OFFSET ?",
            NODE_COLUMNS, where_sql
        );
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(sql_offset(offset)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| Ok((row_to_node(row)?, row.get(13)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count nodes matching a modification-ordered listing
    pub fn count_recent(conn: &Connection, filter: &RecentFilter) -> Result<usize> {
        let mut values = Vec::new();
        let sql = format!("SELECT COUNT(*) FROM nodes n {}", filter.where_sql(&mut values));
        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count nodes stored for a document
    pub fn count_for_document(conn: &Connection, document_id: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// SQLite reads a negative OFFSET as zero, so huge offsets saturate instead
fn sql_offset(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// SQLite treats a negative LIMIT as "no limit"
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| l as i64)
}
