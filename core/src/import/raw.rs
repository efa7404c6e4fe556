use serde::{Deserialize, Serialize};

/// A document exactly as exported by the note service.
///
/// Every field is optional here; shape problems are reported by the
/// linearizer as malformed-tree errors rather than as parse failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawDocument {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub modified: Option<i64>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub checkbox: Option<bool>,
    #[serde(default)]
    pub color: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RawChild>>,
}

/// A child entry: either a nested node or the id of a top-level node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawChild {
    Ref(String),
    Inline(RawNode),
}

impl RawDocument {
    /// Find a node by id anywhere in the document, nested entries included
    pub fn find_mut(&mut self, id: &str) -> Option<&mut RawNode> {
        fn walk<'a>(node: &'a mut RawNode, id: &str) -> Option<&'a mut RawNode> {
            if node.id.as_deref() == Some(id) {
                return Some(node);
            }
            node.children.as_mut()?.iter_mut().find_map(|child| match child {
                RawChild::Inline(inner) => walk(inner, id),
                RawChild::Ref(_) => None,
            })
        }
        self.nodes.iter_mut().find_map(|node| walk(node, id))
    }
}
