use crate::{Error, Result};
use rusqlite::{Connection as SqliteConnection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type Connection = SqliteConnection;

/// Current version of `core/schema.sql`
pub const SCHEMA_VERSION: i32 = 1;

/// How long a connection waits for another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database manager for one archive.
///
/// Cheap to clone: it only holds the path. Every caller opens its own
/// connection, so readers never share a handle with an in-flight import.
#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Create a new database manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Get a connection to the database
    pub fn connect(&self) -> Result<Connection> {
        let conn = SqliteConnection::open(&self.db_path)?;
        Self::configure(&conn)?;
        Ok(conn)
    }

    /// Create a new database and initialize it with the schema
    pub fn create(&self) -> Result<Connection> {
        // Ensure parent directory exists
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = SqliteConnection::open(&self.db_path)?;
        Self::configure(&conn)?;
        self.initialize_schema(&conn)?;

        Ok(conn)
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets readers keep their snapshot while another document is replaced
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::debug!("journal_mode is {} for {}", mode, conn.path().unwrap_or_default());
        }
        Ok(())
    }

    /// Initialize the database schema
    fn initialize_schema(&self, conn: &Connection) -> Result<()> {
        let schema = include_str!("../../schema.sql");
        conn.execute_batch(schema)?;
        Ok(())
    }

    /// Check if the database exists
    pub fn exists(&self) -> bool {
        self.db_path.exists()
    }

    /// Get or create a database connection, migrating the schema if needed
    pub fn get_or_create(&self) -> Result<Connection> {
        if self.exists() {
            let conn = self.connect()?;
            self.migrate(&conn)?;
            Ok(conn)
        } else {
            self.create()
        }
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Bring an existing database up to `SCHEMA_VERSION`
    pub fn migrate(&self, conn: &Connection) -> Result<()> {
        match self.get_schema_version(conn)? {
            None => {
                tracing::info!("Initializing schema in {}", self.db_path.display());
                self.initialize_schema(conn)
            }
            Some(SCHEMA_VERSION) => Ok(()),
            Some(version) => Err(Error::InvalidInput(format!(
                "Unsupported schema version {} (expected {})",
                version, SCHEMA_VERSION
            ))),
        }
    }

    /// Get the current schema version, or `None` for an empty database
    pub fn get_schema_version(&self, conn: &Connection) -> Result<Option<i32>> {
        let has_metadata: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
            [],
            |row| row.get(0),
        )?;
        if !has_metadata {
            return Ok(None);
        }

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        version
            .map(|v| {
                v.parse::<i32>()
                    .map_err(|_| Error::InvalidInput("Invalid schema version".to_string()))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_writes_current_schema() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("archive.db"));
        assert!(!db.exists());

        let conn = db.create().unwrap();
        assert!(db.exists());
        assert_eq!(db.get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('documents', 'nodes', 'nodes_fts', 'sync_state')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_get_or_create_reopens_existing_file() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("nested").join("archive.db"));

        db.get_or_create().unwrap();
        let reopened = db.get_or_create().unwrap();
        assert_eq!(db.get_schema_version(&reopened).unwrap(), Some(SCHEMA_VERSION));
        db.connect().unwrap();
    }

    #[test]
    fn test_migrate_initializes_empty_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::fs::File::create(&db_path).unwrap();

        let db = Database::new(&db_path);
        let conn = db.connect().unwrap();
        assert_eq!(db.get_schema_version(&conn).unwrap(), None);

        db.migrate(&conn).unwrap();
        db.migrate(&conn).unwrap();
        assert_eq!(db.get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_unknown_schema_version_is_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db"));
        let conn = db.create().unwrap();
        conn.execute("UPDATE metadata SET value = '99' WHERE key = 'schema_version'", [])
            .unwrap();

        assert!(matches!(db.migrate(&conn), Err(Error::InvalidInput(_))));
    }
}
