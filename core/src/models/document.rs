use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub file_id: String,
    pub title: String,
    pub filename: String,
    pub version: Option<i64>,
    pub node_count: u32,
    pub imported_at: DateTime<Utc>,
}

impl Document {
    /// Create a document record stamped with the current time
    pub fn new(file_id: String, title: String, filename: String, version: Option<i64>, node_count: u32) -> Self {
        Self {
            file_id,
            title,
            filename,
            version,
            node_count,
            imported_at: Utc::now(),
        }
    }
}
