use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Key/value rows of the `metadata` table.
pub struct MetadataRepository;

impl MetadataRepository {
    pub const LAST_REFRESH_AT: &'static str = "last_refresh_at";

    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}
