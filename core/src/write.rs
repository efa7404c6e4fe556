//! Remote mutations followed by a forced re-import of the touched document.
//!
//! The remote service stays the source of truth: nothing local changes until
//! it has confirmed a write, and the local copy is then rebuilt from what the
//! service returns rather than patched in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;
use crate::import::{Loader, SourceDocument};
use crate::models::Document;
use crate::storage::{DocumentRepository, NodeRepository};
use crate::{Error, Result};

/// Fields to change on an existing node; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

impl NodeChanges {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.note.is_none() && self.checked.is_none()
    }
}

/// Payload of a node to create under an existing parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNode {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Position among the parent's children; `-1` appends
    pub index: i64,
}

impl NewNode {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            note: None,
            checked: None,
            index: -1,
        }
    }
}

/// Client of the remote note service.
///
/// Each call is one atomic request; retries and timeouts are the
/// implementation's business.
pub trait RemoteApi: Send + Sync {
    fn edit(&self, document_id: &str, node_id: &str, changes: &NodeChanges) -> std::result::Result<(), RemoteError>;

    /// Returns the id the service assigned to the new node
    fn add(&self, document_id: &str, parent_id: &str, node: &NewNode) -> std::result::Result<String, RemoteError>;

    /// Current export of a document in the flat node-table format
    fn fetch(&self, document_id: &str) -> std::result::Result<Value, RemoteError>;
}

/// State of the local copy after a confirmed remote write.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resync {
    Synced,
    /// The write stands remotely, but the local rows still show the old tree
    Stale { reason: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriteOutcome {
    pub document_id: String,
    pub node_id: String,
    pub resync: Resync,
}

impl WriteOutcome {
    pub fn is_synced(&self) -> bool {
        self.resync == Resync::Synced
    }
}

pub struct WriteReconciler<'a, R: RemoteApi + ?Sized> {
    remote: &'a R,
    loader: &'a Loader,
}

impl<'a, R: RemoteApi + ?Sized> WriteReconciler<'a, R> {
    pub fn new(remote: &'a R, loader: &'a Loader) -> Self {
        Self { remote, loader }
    }

    /// Edit a node remotely, then re-import its document.
    ///
    /// Fails without contacting the service when `changes` is empty or the
    /// document or node is unknown locally.
    pub fn apply_edit(&self, document: &str, node_id: &str, changes: &NodeChanges) -> Result<WriteOutcome> {
        if changes.is_empty() {
            return Err(Error::InvalidInput("No fields to update".to_string()));
        }

        let document = self.local_target(document, node_id)?;
        self.remote.edit(&document.file_id, node_id, changes)?;
        tracing::info!("Edited node {} in {}", node_id, document.file_id);

        Ok(self.outcome(&document, node_id.to_string()))
    }

    /// Add a node remotely, then re-import its document
    pub fn apply_add(&self, document: &str, parent_id: &str, node: &NewNode) -> Result<WriteOutcome> {
        if node.index < -1 {
            return Err(Error::InvalidInput(format!("Invalid sibling index {}", node.index)));
        }

        let document = self.local_target(document, parent_id)?;
        let node_id = self.remote.add(&document.file_id, parent_id, node)?;
        tracing::info!("Added node {} under {} in {}", node_id, parent_id, document.file_id);

        Ok(self.outcome(&document, node_id))
    }

    fn local_target(&self, document: &str, node_id: &str) -> Result<Document> {
        let conn = self.loader.database().connect()?;
        let document = DocumentRepository::resolve(&conn, document)?;
        NodeRepository::get(&conn, &document.file_id, node_id)?;
        Ok(document)
    }

    fn outcome(&self, document: &Document, node_id: String) -> WriteOutcome {
        let resync = match self.resync(document) {
            Ok(()) => Resync::Synced,
            Err(e) => {
                tracing::warn!("Write to {} succeeded but local resync failed: {}", document.file_id, e);
                Resync::Stale { reason: e.to_string() }
            }
        };
        WriteOutcome {
            document_id: document.file_id.clone(),
            node_id,
            resync,
        }
    }

    fn resync(&self, document: &Document) -> Result<()> {
        let mut export = self.remote.fetch(&document.file_id)?;
        let object = export
            .as_object_mut()
            .ok_or_else(|| Error::source_read(&document.filename, "remote export is not an object"))?;
        object
            .entry("file_id")
            .or_insert_with(|| Value::String(document.file_id.clone()));
        object
            .entry("title")
            .or_insert_with(|| Value::String(document.title.clone()));

        let source = SourceDocument::from_json(document.filename.clone(), &export)?;
        self.loader.import_one(&source, true)?;
        Ok(())
    }
}
