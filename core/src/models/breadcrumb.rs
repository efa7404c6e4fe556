use serde::{Deserialize, Serialize};

use super::{truncate_chars, OutlineNode};

/// One entry of a root-to-node ancestor chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Breadcrumb {
    pub node_id: String,
    pub content: String,
    pub depth: u32,
}

impl From<&OutlineNode> for Breadcrumb {
    fn from(node: &OutlineNode) -> Self {
        Self {
            node_id: node.id.clone(),
            content: node.content.clone(),
            depth: node.depth,
        }
    }
}

impl Breadcrumb {
    /// Display label: the content, or the node id when the content is empty
    pub fn label(&self, max_chars: usize) -> String {
        if self.content.trim().is_empty() {
            self.node_id.clone()
        } else {
            truncate_chars(self.content.lines().next().unwrap_or_default(), max_chars)
        }
    }
}

/// Join a breadcrumb chain into `"root > parent > node"`.
pub fn breadcrumb_string(crumbs: &[Breadcrumb], max_chars: usize) -> String {
    crumbs
        .iter()
        .map(|crumb| crumb.label(max_chars))
        .collect::<Vec<_>>()
        .join(" > ")
}
