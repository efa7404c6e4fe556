use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored outline item.
///
/// `path` is the materialized ancestor chain (`/root/a/b`), `depth` counts
/// path segments minus one, and `sort_order` is the zero-based position among
/// the node's siblings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlineNode {
    pub id: String,
    pub document_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub note: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub sort_order: u32,
    pub depth: u32,
    pub path: String,
    pub checked: Option<bool>,
    pub color: Option<i64>,
    pub child_count: u32,
}

impl OutlineNode {
    /// Check if this is the document root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_children(&self) -> bool {
        self.child_count > 0
    }

    /// Ids from the document root down to and including this node
    pub fn ancestry(&self) -> Vec<&str> {
        path_ids(&self.path)
    }
}

/// Separates ids in a materialized path; never part of an id
pub const PATH_SEPARATOR: char = '/';

/// Split a materialized path into its node ids, root first.
pub fn path_ids(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).filter(|segment| !segment.is_empty()).collect()
}

/// Path of a child given its parent's path.
pub fn child_path(parent_path: &str, id: &str) -> String {
    format!("{}{}{}", parent_path, PATH_SEPARATOR, id)
}
