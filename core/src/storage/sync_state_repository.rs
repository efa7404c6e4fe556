use crate::models::{datetime_to_millis, millis_to_datetime, SyncState};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SyncStateRepository;

impl SyncStateRepository {
    /// Get the sync state of a document, if it was ever imported
    pub fn get(conn: &Connection, document_id: &str) -> Result<Option<SyncState>> {
        let mut stmt = conn.prepare(
            "SELECT document_id, version, last_import_at, source_hash FROM sync_state WHERE document_id = ?1",
        )?;

        let state = stmt
            .query_row(params![document_id], |row| {
                Ok(SyncState {
                    document_id: row.get(0)?,
                    version: row.get(1)?,
                    last_import_at: millis_to_datetime(row.get(2)?),
                    source_hash: row.get(3)?,
                })
            })
            .optional()?;

        Ok(state)
    }

    /// Insert or overwrite the sync state of a document
    pub fn upsert(conn: &Connection, state: &SyncState) -> Result<()> {
        conn.execute(
            "INSERT INTO sync_state (document_id, version, last_import_at, source_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(document_id) DO UPDATE SET
                version = excluded.version,
                last_import_at = excluded.last_import_at,
                source_hash = excluded.source_hash",
            params![
                state.document_id,
                state.version,
                datetime_to_millis(&state.last_import_at),
                state.source_hash,
            ],
        )?;
        Ok(())
    }
}
