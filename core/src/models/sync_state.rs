use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the loader last saw of a document's source export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncState {
    pub document_id: String,
    pub version: Option<i64>,
    pub last_import_at: DateTime<Utc>,
    pub source_hash: String,
}

impl SyncState {
    pub fn new(document_id: String, version: Option<i64>, source_hash: String) -> Self {
        Self {
            document_id,
            version,
            last_import_at: Utc::now(),
            source_hash,
        }
    }

    /// True when a source with `hash` has already been imported
    pub fn matches(&self, hash: &str) -> bool {
        self.source_hash == hash
    }
}
