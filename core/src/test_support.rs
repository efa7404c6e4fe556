//! Fixture documents and helpers shared by unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use crate::config::ArchiveConfig;
use crate::error::RemoteError;
use crate::import::{Loader, RawChild, RawDocument, RawNode, SourceDocument, SOURCE_SUFFIX};
use crate::storage::{Connection, Database};
use crate::write::{NewNode, NodeChanges, RemoteApi};

pub fn setup_test_db() -> (TempDir, Database, Connection) {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));
    let conn = db.create().unwrap();
    (dir, db, conn)
}

pub fn raw(value: Value) -> RawDocument {
    serde_json::from_value(value).unwrap()
}

pub fn source(label: &str, value: Value) -> SourceDocument {
    SourceDocument::from_json(label, &value).unwrap()
}

pub fn loader(db: &Database) -> Loader {
    Loader::new(db.clone(), &ArchiveConfig::default())
}

pub fn import_json(db: &Database, value: Value) {
    let label = value["file_id"].as_str().unwrap_or("fixture").to_string();
    loader(db).import_one(&source(&label, value), false).unwrap();
}

pub fn write_source_dir(dir: &Path, documents: &[(&str, Value)]) {
    for (name, value) in documents {
        let path = dir.join(format!("{}{}", name, SOURCE_SUFFIX));
        std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
    }
}

/// Nested export: R > "Shopping list" > `b_content` (unchecked), R > Work > "Send report"
pub fn shopping_json(b_content: &str) -> Value {
    json!({
        "file_id": "shop",
        "title": "Shopping",
        "version": 4,
        "nodes": [{
            "id": "root",
            "content": "R",
            "created": 1000,
            "modified": 1000,
            "children": [
                {
                    "id": "a",
                    "content": "Shopping list",
                    "created": 1001,
                    "modified": 1001,
                    "children": [
                        {"id": "b", "content": b_content, "checked": false, "created": 1002, "modified": 1002}
                    ]
                },
                {
                    "id": "c",
                    "content": "Work",
                    "created": 1003,
                    "modified": 1003,
                    "children": [
                        {"id": "d", "content": "Send report", "note": "quarterly", "created": 1004, "modified": 1004}
                    ]
                }
            ]
        }]
    })
}

/// Flat export in the remote service's format
pub fn notes_json() -> Value {
    json!({
        "file_id": "doc1",
        "title": "Notes",
        "version": 1,
        "nodes": [
            {"id": "root", "content": "Notes", "created": 1000, "modified": 2000, "children": ["n1", "n2"]},
            {
                "id": "n1",
                "content": "Python is great for scripting",
                "note": "use type hints",
                "created": 1001,
                "modified": 2001,
                "children": ["n1a"]
            },
            {"id": "n1a", "content": "FastAPI for web services", "created": 1002, "modified": 2002},
            {"id": "n2", "content": "Rust is fast", "note": "memory safety", "created": 1003, "modified": 2003}
        ]
    })
}

pub fn recipes_json() -> Value {
    json!({
        "file_id": "doc2",
        "title": "Recipes",
        "version": 7,
        "nodes": [
            {"id": "root", "content": "Recipes", "created": 1000, "modified": 3000, "children": ["r1"]},
            {"id": "r1", "content": "Python cake recipe", "note": "not a real snake", "created": 1001, "modified": 3001}
        ]
    })
}

/// In-memory stand-in for the remote note service.
#[derive(Default)]
pub struct FakeRemote {
    documents: Mutex<HashMap<String, RawDocument>>,
    next_id: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub fail_fetches: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeRemote {
    pub fn with_documents(documents: Vec<Value>) -> Self {
        let remote = Self::default();
        {
            let mut map = remote.documents.lock().unwrap();
            for value in documents {
                let doc = raw(value);
                map.insert(doc.file_id.clone().unwrap(), doc);
            }
        }
        remote
    }

    fn with_node<T>(
        &self,
        document_id: &str,
        node_id: &str,
        apply: impl FnOnce(&mut RawNode) -> T,
    ) -> Result<T, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::new("service unavailable"));
        }
        let mut documents = self.documents.lock().unwrap();
        let node = documents
            .get_mut(document_id)
            .and_then(|doc| doc.find_mut(node_id))
            .ok_or_else(|| RemoteError::new(format!("no node {}", node_id)))?;
        Ok(apply(node))
    }
}

impl RemoteApi for FakeRemote {
    fn edit(&self, document_id: &str, node_id: &str, changes: &NodeChanges) -> Result<(), RemoteError> {
        self.with_node(document_id, node_id, |node| {
            if let Some(content) = &changes.content {
                node.content = Some(content.clone());
            }
            if let Some(note) = &changes.note {
                node.note = Some(note.clone());
            }
            if let Some(checked) = changes.checked {
                node.checked = Some(checked);
            }
            node.modified = Some(node.modified.unwrap_or_default() + 10_000);
        })
    }

    fn add(&self, document_id: &str, parent_id: &str, new_node: &NewNode) -> Result<String, RemoteError> {
        let id = format!("new{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let child = RawNode {
            id: Some(id.clone()),
            content: Some(new_node.content.clone()),
            note: new_node.note.clone(),
            checked: new_node.checked,
            created: Some(9_000),
            modified: Some(9_000),
            ..RawNode::default()
        };
        self.with_node(document_id, parent_id, |parent| {
            let children = parent.children.get_or_insert_with(Vec::new);
            let index = usize::try_from(new_node.index)
                .map(|i| i.min(children.len()))
                .unwrap_or(children.len());
            children.insert(index, RawChild::Inline(child));
        })?;
        Ok(id)
    }

    /// Like the real service, the read response carries no `file_id`
    fn fetch(&self, document_id: &str) -> Result<Value, RemoteError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(RemoteError::new("fetch timed out"));
        }
        let documents = self.documents.lock().unwrap();
        let doc = documents
            .get(document_id)
            .ok_or_else(|| RemoteError::new(format!("no document {}", document_id)))?;
        let mut value = serde_json::to_value(doc).map_err(|e| RemoteError::new(e.to_string()))?;
        if let Some(object) = value.as_object_mut() {
            object.remove("file_id");
        }
        Ok(value)
    }
}
