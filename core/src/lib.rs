//! Local archive of outline documents exported from a remote note service.
//!
//! Exports are flattened into SQLite rows with materialized paths, indexed
//! with FTS5, and served back as scoped searches, tree views and markdown.
//! [`Archive`](archive::Archive) bundles the caller-facing operations.

pub mod archive;
pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod search;
pub mod storage;
pub mod tree;
pub mod write;

#[cfg(test)]
mod test_support;

pub use archive::Archive;
pub use config::{load_config, ArchiveConfig};
pub use error::{Error, RemoteError, Result};
