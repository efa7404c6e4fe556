use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::raw::RawDocument;
use crate::{Error, Result};

/// Suffix of per-document export files
pub const SOURCE_SUFFIX: &str = ".c.json";

/// Optional index mapping file ids to human-readable filenames
pub const FILENAMES_INDEX: &str = "_raw_filenames.json";

/// One raw exported document, as handed over by the file-ingestion layer.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    label: String,
    bytes: Vec<u8>,
    filenames: Arc<HashMap<String, String>>,
}

impl SourceDocument {
    /// `label` names the source in logs and is the fallback filename
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
            filenames: Arc::default(),
        }
    }

    pub fn from_json(label: impl Into<String>, value: &serde_json::Value) -> Result<Self> {
        Ok(Self::new(label, serde_json::to_vec(value)?))
    }

    fn with_filenames(mut self, filenames: Arc<HashMap<String, String>>) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// SHA-256 of the raw bytes, hex encoded
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Parse the raw JSON
    pub fn parse(&self) -> Result<RawDocument> {
        serde_json::from_slice(&self.bytes).map_err(|e| Error::source_read(&self.label, e))
    }

    /// Human-readable filename for a document id found in this source
    pub fn filename_for(&self, file_id: &str) -> String {
        self.filenames
            .get(file_id)
            .cloned()
            .unwrap_or_else(|| self.label.clone())
    }
}

/// A directory of `*.c.json` exports written by the backup process.
#[derive(Debug, Clone)]
pub struct SourceDir {
    root: PathBuf,
}

impl SourceDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Read every export in the directory, sorted by file name.
    ///
    /// The outer error is for an unreadable directory; each inner result is one
    /// document, so a bad file only fails itself.
    pub fn documents(&self) -> Result<Vec<Result<SourceDocument>>> {
        let filenames = Arc::new(self.filename_index()?);

        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let name = entry.file_name().to_string_lossy();
            let Some(stem) = name.strip_suffix(SOURCE_SUFFIX) else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let document = std::fs::read(entry.path())
                .map(|bytes| SourceDocument::new(stem, bytes).with_filenames(Arc::clone(&filenames)))
                .map_err(|e| Error::source_read(&name, e));
            documents.push(document);
        }

        tracing::debug!("Found {} source documents in {}", documents.len(), self.root.display());
        Ok(documents)
    }

    fn filename_index(&self) -> Result<HashMap<String, String>> {
        #[derive(serde::Deserialize)]
        struct Entry {
            id: String,
            #[serde(rename = "_path")]
            path: String,
        }

        let index_path = self.root.join(FILENAMES_INDEX);
        if !index_path.exists() {
            return Ok(HashMap::new());
        }

        let bytes = std::fs::read(&index_path)?;
        let entries: Vec<Entry> =
            serde_json::from_slice(&bytes).map_err(|e| Error::source_read(FILENAMES_INDEX, e))?;
        Ok(entries.into_iter().map(|e| (e.id, e.path)).collect())
    }
}
