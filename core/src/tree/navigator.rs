use std::collections::HashMap;

use serde::Serialize;

use crate::config::ArchiveConfig;
use crate::models::{breadcrumb_string, Breadcrumb, Document, NodeContext, OutlineNode};
use crate::storage::{Connection, DocumentRepository, NodeRepository};
use crate::{Error, Result};

/// A node with the part of its subtree that was fetched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubtreeNode {
    pub node: OutlineNode,
    pub children: Vec<SubtreeNode>,
    /// Children exist but were cut off by the depth bound
    pub truncated: bool,
}

impl SubtreeNode {
    /// Number of nodes in this view, the root included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SubtreeNode::node_count).sum::<usize>()
    }

    /// Deepest level present, relative to this node
    pub fn height(&self) -> u32 {
        self.children.iter().map(|c| c.height() + 1).max().unwrap_or(0)
    }
}

/// Read-only tree traversal over stored nodes.
pub struct Navigator<'a> {
    conn: &'a Connection,
    config: &'a ArchiveConfig,
}

impl<'a> Navigator<'a> {
    pub fn new(conn: &'a Connection, config: &'a ArchiveConfig) -> Self {
        Self { conn, config }
    }

    /// Find a node, optionally without naming its document.
    ///
    /// Without a document the id must be unique across the archive.
    pub fn resolve_node(&self, document: Option<&str>, node_id: &str) -> Result<(Document, OutlineNode)> {
        match document {
            Some(name) => {
                let document = DocumentRepository::resolve(self.conn, name)?;
                let node = NodeRepository::get(self.conn, &document.file_id, node_id)?;
                Ok((document, node))
            }
            None => {
                let mut matches = NodeRepository::find_by_id(self.conn, node_id)?;
                match matches.len() {
                    0 => Err(Error::NotFound(format!("Node not found: {}", node_id))),
                    1 => {
                        let node = matches.remove(0);
                        let document = DocumentRepository::get_by_id(self.conn, &node.document_id)?;
                        Ok((document, node))
                    }
                    n => Err(Error::InvalidInput(format!(
                        "Node {} exists in {} documents; name the document",
                        node_id, n
                    ))),
                }
            }
        }
    }

    /// Ancestor chain of the node at `path`, root first, the node included
    pub fn breadcrumbs(&self, document_id: &str, path: &str) -> Result<Vec<Breadcrumb>> {
        let chain = NodeRepository::get_ancestors(self.conn, document_id, path)?;
        Ok(chain.iter().map(Breadcrumb::from).collect())
    }

    /// `"root > parent > node"` with each label capped at `breadcrumb_chars`
    pub fn breadcrumb_string(&self, document_id: &str, path: &str) -> Result<String> {
        let crumbs = self.breadcrumbs(document_id, path)?;
        Ok(breadcrumb_string(&crumbs, self.config.breadcrumb_chars))
    }

    /// Up to `window` siblings on each side of `node`; the root has none
    pub fn siblings(&self, node: &OutlineNode, window: usize) -> Result<(Vec<OutlineNode>, Vec<OutlineNode>)> {
        match &node.parent_id {
            Some(parent_id) => {
                NodeRepository::get_siblings(self.conn, &node.document_id, parent_id, node.sort_order, window)
            }
            None => Ok((Vec::new(), Vec::new())),
        }
    }

    pub fn children(&self, node: &OutlineNode, limit: Option<usize>) -> Result<Vec<OutlineNode>> {
        NodeRepository::get_children(self.conn, &node.document_id, &node.id, limit)
    }

    /// Fetch the subtree under `root_id`, at most `max_depth` levels below it.
    ///
    /// Rows come from one path-prefix query and are assembled by parent id.
    pub fn subtree(&self, document_id: &str, root_id: &str, max_depth: Option<u32>) -> Result<SubtreeNode> {
        let root = NodeRepository::get(self.conn, document_id, root_id)?;
        let bound = max_depth.map(|d| root.depth.saturating_add(d));
        let rows = NodeRepository::get_subtree(self.conn, document_id, &root.path, bound)?;

        let mut by_parent: HashMap<String, Vec<OutlineNode>> = HashMap::new();
        for row in rows {
            if row.id == root.id {
                continue;
            }
            if let Some(parent_id) = row.parent_id.clone() {
                by_parent.entry(parent_id).or_default().push(row);
            }
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by_key(|n| n.sort_order);
        }

        Ok(assemble(root, &mut by_parent))
    }

    /// A node with its breadcrumbs, sibling window and first children
    pub fn node_context(
        &self,
        document: Option<&str>,
        node_id: &str,
        sibling_window: usize,
        child_limit: usize,
    ) -> Result<NodeContext> {
        let _snapshot = self.conn.unchecked_transaction()?;
        let (document, node) = self.resolve_node(document, node_id)?;
        let breadcrumbs = self.breadcrumbs(&document.file_id, &node.path)?;
        let (siblings_before, siblings_after) = self.siblings(&node, sibling_window)?;
        let children = self.children(&node, Some(child_limit))?;

        Ok(NodeContext {
            node,
            document,
            breadcrumbs,
            siblings_before,
            siblings_after,
            children,
        })
    }
}

fn assemble(node: OutlineNode, by_parent: &mut HashMap<String, Vec<OutlineNode>>) -> SubtreeNode {
    let children: Vec<SubtreeNode> = by_parent
        .remove(&node.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| assemble(child, by_parent))
        .collect();
    let truncated = children.is_empty() && node.has_children();

    SubtreeNode {
        node,
        children,
        truncated,
    }
}
