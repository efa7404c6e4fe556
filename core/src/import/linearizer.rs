use std::collections::{HashMap, HashSet};

use super::raw::{RawChild, RawDocument, RawNode};
use crate::models::{child_path, millis_to_datetime, Document, OutlineNode, PATH_SEPARATOR};
use crate::{Error, Result};

/// Id of the root entry in the note service's flat exports
const ROOT_ID: &str = "root";

struct Frame<'a> {
    node: &'a RawNode,
    parent_id: Option<String>,
    parent_path: String,
    depth: usize,
    sort_order: usize,
}

fn malformed(file_id: &str, message: impl std::fmt::Display) -> Error {
    Error::MalformedTree(format!("document {}: {}", file_id, message))
}

/// Flatten one raw document into its document row and pre-ordered node rows.
///
/// Children may be nested objects or ids of entries in the top-level `nodes`
/// table. Ids must be unique within the document, every table entry must be
/// reachable from the root and nesting may not exceed `max_depth`.
pub fn linearize(raw: &RawDocument, filename: &str, max_depth: usize) -> Result<(Document, Vec<OutlineNode>)> {
    let file_id = raw
        .file_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MalformedTree(format!("{}: document has no file_id", filename)))?;

    let mut table: HashMap<&str, &RawNode> = HashMap::with_capacity(raw.nodes.len());
    for (index, node) in raw.nodes.iter().enumerate() {
        let id = node_id(node).ok_or_else(|| malformed(file_id, format!("node #{} has no id", index)))?;
        check_id(file_id, id)?;
        if table.insert(id, node).is_some() {
            return Err(malformed(file_id, format!("duplicate node id {}", id)));
        }
    }

    let root = table
        .get(ROOT_ID)
        .copied()
        .or_else(|| raw.nodes.first())
        .ok_or_else(|| malformed(file_id, "document has no nodes"))?;

    let mut seen: HashSet<&str> = HashSet::with_capacity(table.len());
    let mut nodes = Vec::with_capacity(table.len());
    let mut stack = vec![Frame {
        node: root,
        parent_id: None,
        parent_path: String::new(),
        depth: 0,
        sort_order: 0,
    }];

    while let Some(frame) = stack.pop() {
        let id = node_id(frame.node).ok_or_else(|| {
            malformed(
                file_id,
                format!("a child of {} has no id", frame.parent_id.as_deref().unwrap_or(ROOT_ID)),
            )
        })?;
        check_id(file_id, id)?;
        if frame.depth > max_depth {
            return Err(malformed(file_id, format!("node {} is nested deeper than {}", id, max_depth)));
        }
        if !seen.insert(id) {
            return Err(malformed(file_id, format!("node {} is reachable more than once", id)));
        }

        let children = resolve_children(file_id, id, frame.node, &table)?;
        let path = child_path(&frame.parent_path, id);

        nodes.push(OutlineNode {
            id: id.to_string(),
            document_id: file_id.to_string(),
            parent_id: frame.parent_id,
            content: frame.node.content.clone().unwrap_or_default(),
            note: frame.node.note.clone().filter(|note| !note.is_empty()),
            created: millis_to_datetime(frame.node.created.unwrap_or_default()),
            modified: millis_to_datetime(frame.node.modified.unwrap_or_default()),
            sort_order: frame.sort_order as u32,
            depth: frame.depth as u32,
            path: path.clone(),
            checked: checkbox_state(frame.node),
            color: frame.node.color,
            child_count: children.len() as u32,
        });

        // Reversed so the first child is popped first
        for (sort_order, child) in children.into_iter().enumerate().rev() {
            stack.push(Frame {
                node: child,
                parent_id: Some(id.to_string()),
                parent_path: path.clone(),
                depth: frame.depth + 1,
                sort_order,
            });
        }
    }

    let mut orphans: Vec<&str> = table.keys().copied().filter(|id| !seen.contains(id)).collect();
    if !orphans.is_empty() {
        orphans.sort_unstable();
        return Err(malformed(file_id, format!("orphaned nodes {:?}", orphans)));
    }

    let document = Document::new(
        file_id.to_string(),
        raw.title.clone().unwrap_or_else(|| filename.to_string()),
        filename.to_string(),
        raw.version,
        nodes.len() as u32,
    );

    Ok((document, nodes))
}

fn node_id(node: &RawNode) -> Option<&str> {
    node.id.as_deref().filter(|id| !id.is_empty())
}

fn check_id(file_id: &str, id: &str) -> Result<()> {
    if id.contains(PATH_SEPARATOR) {
        return Err(malformed(file_id, format!("node id {:?} contains '{}'", id, PATH_SEPARATOR)));
    }
    Ok(())
}

fn resolve_children<'a>(
    file_id: &str,
    parent_id: &str,
    node: &'a RawNode,
    table: &HashMap<&str, &'a RawNode>,
) -> Result<Vec<&'a RawNode>> {
    let Some(entries) = node.children.as_ref() else {
        return Ok(Vec::new());
    };

    let mut siblings: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut children = Vec::with_capacity(entries.len());
    for entry in entries {
        let child = match entry {
            RawChild::Ref(id) => table
                .get(id.as_str())
                .copied()
                .ok_or_else(|| malformed(file_id, format!("{} lists unknown child {}", parent_id, id)))?,
            RawChild::Inline(child) => child,
        };
        if let Some(id) = node_id(child) {
            if !siblings.insert(id) {
                return Err(malformed(file_id, format!("{} has two children with id {}", parent_id, id)));
            }
        }
        children.push(child);
    }
    Ok(children)
}

/// `checked` wins; a bare `checkbox: true` is an unticked checkbox
fn checkbox_state(node: &RawNode) -> Option<bool> {
    node.checked
        .or_else(|| node.checkbox.filter(|&shown| shown).map(|_| false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{notes_json, raw, shopping_json};
    use serde_json::json;

    #[test]
    fn test_document_metadata() {
        let (doc, nodes) = linearize(&raw(notes_json()), "notes", 64).unwrap();
        assert_eq!(doc.file_id, "doc1");
        assert_eq!(doc.title, "Notes");
        assert_eq!(doc.filename, "notes");
        assert_eq!(doc.version, Some(1));
        assert_eq!(doc.node_count as usize, nodes.len());
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn test_tree_metadata_for_flat_export() {
        let (_doc, nodes) = linearize(&raw(notes_json()), "notes", 64).unwrap();
        let by_id: HashMap<_, _> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let root = by_id["root"];
        assert_eq!(root.path, "/root");
        assert_eq!(root.depth, 0);
        assert_eq!(root.parent_id, None);
        assert_eq!(root.child_count, 2);

        let nested = by_id["n1a"];
        assert_eq!(nested.path, "/root/n1/n1a");
        assert_eq!(nested.depth, 2);
        assert_eq!(nested.parent_id.as_deref(), Some("n1"));
        assert_eq!(nested.sort_order, 0);
        assert_eq!(by_id["n2"].sort_order, 1);
        assert_eq!(by_id["n1"].note.as_deref(), Some("use type hints"));
    }

    #[test]
    fn test_pre_order_traversal() {
        let (_doc, nodes) = linearize(&raw(shopping_json("Buy milk")), "shopping", 64).unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_path_and_sibling_invariants() {
        let (_doc, nodes) = linearize(&raw(shopping_json("Buy milk")), "shopping", 64).unwrap();
        let by_id: HashMap<_, _> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        for node in &nodes {
            assert_eq!(node.depth as usize, node.ancestry().len() - 1);
            match &node.parent_id {
                None => assert_eq!(node.path, "/root"),
                Some(parent) => {
                    let parent = by_id[parent.as_str()];
                    assert_eq!(node.path, format!("{}/{}", parent.path, node.id));
                }
            }
            let children: Vec<_> = nodes
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(node.id.as_str()))
                .collect();
            assert_eq!(children.len(), node.child_count as usize);
            let mut orders: Vec<_> = children.iter().map(|c| c.sort_order).collect();
            orders.sort_unstable();
            assert_eq!(orders, (0..children.len() as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_optional_fields_normalize() {
        let doc = json!({
            "file_id": "d",
            "title": "T",
            "nodes": [{
                "id": "root",
                "note": "",
                "checked": null,
                "children": [
                    {"id": "a", "checkbox": true},
                    {"id": "b", "checked": true, "color": 3},
                    {"id": "c", "checkbox": false}
                ]
            }]
        });
        let (_doc, nodes) = linearize(&raw(doc), "t", 64).unwrap();

        assert_eq!(nodes[0].content, "");
        assert_eq!(nodes[0].note, None);
        assert_eq!(nodes[0].checked, None);
        assert_eq!(nodes[1].checked, Some(false));
        assert_eq!(nodes[2].checked, Some(true));
        assert_eq!(nodes[2].color, Some(3));
        assert_eq!(nodes[3].checked, None);
    }

    #[test]
    fn test_title_falls_back_to_filename() {
        let doc = json!({"file_id": "d", "nodes": [{"id": "root"}]});
        let (doc, _nodes) = linearize(&raw(doc), "fallback", 64).unwrap();
        assert_eq!(doc.title, "fallback");
    }

    #[test]
    fn test_root_may_have_any_id_when_nested() {
        let doc = json!({"file_id": "d", "nodes": [{"id": "top", "children": [{"id": "x"}]}]});
        let (_doc, nodes) = linearize(&raw(doc), "d", 64).unwrap();
        assert_eq!(nodes[0].path, "/top");
        assert_eq!(nodes[1].path, "/top/x");
    }

    fn assert_malformed(doc: serde_json::Value) {
        let result = linearize(&raw(doc), "bad", 4);
        assert!(matches!(result, Err(Error::MalformedTree(_))), "got {:?}", result);
    }

    #[test]
    fn test_missing_ids_are_rejected() {
        assert_malformed(json!({"nodes": [{"id": "root"}]}));
        assert_malformed(json!({"file_id": "d", "nodes": [{"id": "root"}, {"content": "no id"}]}));
        assert_malformed(json!({"file_id": "d", "nodes": [{"id": "root", "children": [{"content": "x"}]}]}));
    }

    #[test]
    fn test_ids_with_path_separator_are_rejected() {
        assert_malformed(json!({"file_id": "d", "nodes": [{"id": "root", "children": [{"id": "a/b"}]}]}));
        assert_malformed(json!({
            "file_id": "d",
            "nodes": [{"id": "root", "children": ["a", "a/b"]}, {"id": "a"}, {"id": "a/b"}]
        }));
        assert_malformed(json!({"file_id": "d", "nodes": [{"id": "/root"}]}));
    }

    #[test]
    fn test_sibling_collision_is_rejected() {
        assert_malformed(json!({
            "file_id": "d",
            "nodes": [{"id": "root", "children": [{"id": "a"}, {"id": "a"}]}]
        }));
    }

    #[test]
    fn test_shared_and_cyclic_references_are_rejected() {
        assert_malformed(json!({
            "file_id": "d",
            "nodes": [{"id": "root", "children": ["a", "b"]}, {"id": "a", "children": ["b"]}, {"id": "b"}]
        }));
        assert_malformed(json!({
            "file_id": "d",
            "nodes": [{"id": "root", "children": ["a"]}, {"id": "a", "children": ["root"]}]
        }));
    }

    #[test]
    fn test_unknown_children_and_orphans_are_rejected() {
        assert_malformed(json!({"file_id": "d", "nodes": [{"id": "root", "children": ["ghost"]}]}));
        assert_malformed(json!({"file_id": "d", "nodes": [{"id": "root"}, {"id": "stray"}]}));
        assert_malformed(json!({"file_id": "d", "nodes": []}));
    }

    #[test]
    fn test_depth_guard() {
        let mut node = json!({"id": "n5"});
        for level in (0..5).rev() {
            node = json!({"id": format!("n{}", level), "children": [node]});
        }
        let doc = json!({"file_id": "d", "nodes": [node]});

        // n0..n5 spans depths 0..=5
        assert!(linearize(&raw(doc.clone()), "deep", 5).is_ok());
        assert_malformed(doc);
    }

    #[test]
    fn test_deterministic() {
        let first = linearize(&raw(shopping_json("Buy milk")), "s", 64).unwrap().1;
        let second = linearize(&raw(shopping_json("Buy milk")), "s", 64).unwrap().1;
        assert_eq!(first, second);
    }
}
