use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::linearizer::linearize;
use super::source::{SourceDir, SourceDocument};
use crate::config::ArchiveConfig;
use crate::models::{datetime_to_millis, millis_to_datetime, SyncState};
use crate::storage::{Connection, Database, DocumentRepository, MetadataRepository, SyncStateRepository};
use crate::{Error, Result};

/// What happened to one source document during an import.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    Imported { nodes: usize },
    Unchanged,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentOutcome {
    pub source: String,
    pub document_id: Option<String>,
    #[serde(flatten)]
    pub status: ImportStatus,
}

/// Per-document outcome table of one import run.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ImportSummary {
    pub outcomes: Vec<DocumentOutcome>,
}

impl ImportSummary {
    pub fn imported(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Imported { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Failed { .. }))
    }

    pub fn nodes_imported(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                ImportStatus::Imported { nodes } => nodes,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&ImportStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// When the archive last pulled from its source directory.
///
/// Loaded once at startup and handed to [`Loader::refresh_if_due`], which is
/// the only place that advances it.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState {
    interval: Duration,
    last_refresh: Option<DateTime<Utc>>,
}

impl RefreshState {
    pub fn new(interval: Duration, last_refresh: Option<DateTime<Utc>>) -> Self {
        Self { interval, last_refresh }
    }

    /// Read the last refresh time recorded in the store
    pub fn load(conn: &Connection, interval: Duration) -> Result<Self> {
        let last_refresh = MetadataRepository::get(conn, MetadataRepository::LAST_REFRESH_AT)?
            .and_then(|value| value.parse::<i64>().ok())
            .map(millis_to_datetime);
        Ok(Self::new(interval, last_refresh))
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.last_refresh.map_or(true, |last| now - last >= self.interval)
    }
}

/// One mutex per document id; imports of different documents never wait on
/// each other here.
#[derive(Debug, Default)]
struct DocumentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DocumentLocks {
    fn get(&self, document_id: &str) -> Arc<Mutex<()>> {
        // Clone the handle out so the map shard is released before locking
        Arc::clone(self.locks.entry(document_id.to_string()).or_default().value())
    }
}

/// Imports source documents into the store.
///
/// Clones share the same per-document locks, so a clone may be handed to
/// another thread while imports are running.
#[derive(Debug, Clone)]
pub struct Loader {
    db: Database,
    locks: Arc<DocumentLocks>,
    max_tree_depth: usize,
}

impl Loader {
    pub fn new(db: Database, config: &ArchiveConfig) -> Self {
        Self {
            db,
            locks: Arc::default(),
            max_tree_depth: config.max_tree_depth,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Import a batch of sources.
    ///
    /// A document that cannot be read, parsed, linearized or stored is
    /// reported as failed and leaves its previously imported rows untouched;
    /// the rest of the batch continues. Only failing to open the store at all
    /// aborts the run.
    pub fn import<I>(&self, sources: I, force: bool) -> Result<ImportSummary>
    where
        I: IntoIterator<Item = Result<SourceDocument>>,
    {
        let conn = self.db.connect()?;
        let mut summary = ImportSummary::default();

        for source in sources {
            let outcome = match source {
                Ok(source) => self.import_source(&conn, &source, force),
                Err(e) => DocumentOutcome {
                    source: source_name(&e),
                    document_id: None,
                    status: ImportStatus::Failed { error: e.to_string() },
                },
            };
            summary.outcomes.push(outcome);
        }

        tracing::info!(
            "Import complete: {} imported, {} unchanged, {} failed, {} nodes",
            summary.imported(),
            summary.unchanged(),
            summary.failed(),
            summary.nodes_imported()
        );
        Ok(summary)
    }

    /// Import every export of a source directory
    pub fn import_dir(&self, source_dir: &SourceDir, force: bool) -> Result<ImportSummary> {
        self.import(source_dir.documents()?, force)
    }

    /// Import a single document on its own connection, surfacing its error
    pub fn import_one(&self, source: &SourceDocument, force: bool) -> Result<ImportStatus> {
        let conn = self.db.connect()?;
        self.import_document(&conn, source, force)
            .map(|(_, status)| status)
    }

    fn import_source(&self, conn: &Connection, source: &SourceDocument, force: bool) -> DocumentOutcome {
        match self.import_document(conn, source, force) {
            Ok((document_id, status)) => DocumentOutcome {
                source: source.label().to_string(),
                document_id: Some(document_id),
                status,
            },
            Err(e) => {
                tracing::warn!("Failed to import {}: {}", source.label(), e);
                DocumentOutcome {
                    source: source.label().to_string(),
                    document_id: source.parse().ok().and_then(|raw| raw.file_id),
                    status: ImportStatus::Failed { error: e.to_string() },
                }
            }
        }
    }

    fn import_document(
        &self,
        conn: &Connection,
        source: &SourceDocument,
        force: bool,
    ) -> Result<(String, ImportStatus)> {
        let raw = source.parse()?;
        let document_id = raw
            .file_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedTree(format!("{}: document has no file_id", source.label())))?;

        let lock = self.locks.get(&document_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let source_hash = source.content_hash();
        if !force {
            if let Some(state) = SyncStateRepository::get(conn, &document_id)? {
                if state.matches(&source_hash) {
                    tracing::debug!("{} unchanged, skipping", document_id);
                    return Ok((document_id, ImportStatus::Unchanged));
                }
            }
        }

        let (document, nodes) = linearize(&raw, &source.filename_for(&document_id), self.max_tree_depth)?;
        DocumentRepository::replace(conn, &document, &nodes)?;
        SyncStateRepository::upsert(conn, &SyncState::new(document_id.clone(), document.version, source_hash))?;

        tracing::debug!("Imported {} ({} nodes)", document.title, nodes.len());
        Ok((document_id, ImportStatus::Imported { nodes: nodes.len() }))
    }

    /// Re-import from `source_dir` if the refresh interval has elapsed.
    ///
    /// The refresh time is recorded even when individual documents fail, so a
    /// broken export does not trigger a re-import on every call.
    pub fn refresh_if_due(&self, state: &mut RefreshState, source_dir: &SourceDir) -> Result<Option<ImportSummary>> {
        let now = Utc::now();
        if !state.is_due(now) || !source_dir.exists() {
            return Ok(None);
        }

        let summary = self.import_dir(source_dir, false)?;
        if summary.imported() > 0 {
            tracing::info!("Refreshed {} documents from {}", summary.imported(), source_dir.path().display());
        }

        let conn = self.db.connect()?;
        MetadataRepository::set(
            &conn,
            MetadataRepository::LAST_REFRESH_AT,
            &datetime_to_millis(&now).to_string(),
        )?;
        state.last_refresh = Some(now);
        Ok(Some(summary))
    }
}

fn source_name(error: &Error) -> String {
    match error {
        Error::SourceRead { source_name, .. } => source_name.clone(),
        _ => "<unknown>".to_string(),
    }
}
