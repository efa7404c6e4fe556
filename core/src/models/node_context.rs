use serde::{Deserialize, Serialize};

use super::{Breadcrumb, Document, OutlineNode};

/// A node with its position in the tree around it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeContext {
    pub node: OutlineNode,
    pub document: Document,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub siblings_before: Vec<OutlineNode>,
    pub siblings_after: Vec<OutlineNode>,
    pub children: Vec<OutlineNode>,
}
