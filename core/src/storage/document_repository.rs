use crate::models::{datetime_to_millis, millis_to_datetime, Document, OutlineNode};
use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct DocumentRepository;

const DOCUMENT_COLUMNS: &str = "file_id, title, filename, version, node_count, imported_at";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        file_id: row.get(0)?,
        title: row.get(1)?,
        filename: row.get(2)?,
        version: row.get(3)?,
        node_count: row.get(4)?,
        imported_at: millis_to_datetime(row.get(5)?),
    })
}

impl DocumentRepository {
    /// Replace a document and its whole node set in one transaction.
    ///
    /// Old node rows are deleted, the document row is upserted and the new
    /// nodes inserted; the FTS triggers mirror each row change. Readers on
    /// other connections see either the old tree or the new one.
    pub fn replace(conn: &Connection, document: &Document, nodes: &[OutlineNode]) -> Result<()> {
        if let Some(stray) = nodes.iter().find(|n| n.document_id != document.file_id) {
            return Err(Error::InvalidInput(format!(
                "Node {} belongs to document {}, not {}",
                stray.id, stray.document_id, document.file_id
            )));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM nodes WHERE document_id = ?1", params![document.file_id])?;
        tx.execute(
            "INSERT INTO documents (file_id, title, filename, version, node_count, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(file_id) DO UPDATE SET
                title = excluded.title,
                filename = excluded.filename,
                version = excluded.version,
                node_count = excluded.node_count,
                imported_at = excluded.imported_at",
            params![
                document.file_id,
                document.title,
                document.filename,
                document.version,
                document.node_count,
                datetime_to_millis(&document.imported_at),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO nodes (id, document_id, parent_id, content, note, created, modified,
                 sort_order, depth, path, checked, color, child_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for node in nodes {
                stmt.execute(params![
                    node.id,
                    node.document_id,
                    node.parent_id,
                    node.content,
                    node.note.as_deref().unwrap_or(""),
                    datetime_to_millis(&node.created),
                    datetime_to_millis(&node.modified),
                    node.sort_order,
                    node.depth,
                    node.path,
                    node.checked,
                    node.color,
                    node.child_count,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get a document by file id
    pub fn get_by_id(conn: &Connection, file_id: &str) -> Result<Document> {
        let sql = format!("SELECT {} FROM documents WHERE file_id = ?1", DOCUMENT_COLUMNS);
        conn.query_row(&sql, params![file_id], row_to_document)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Document not found: {}", file_id)))
    }

    /// Resolve a caller-supplied name: file id first, then title, then filename
    pub fn resolve(conn: &Connection, name: &str) -> Result<Document> {
        let sql = format!(
            "SELECT {} FROM documents WHERE file_id = ?1 OR title = ?1 OR filename = ?1
             ORDER BY CASE WHEN file_id = ?1 THEN 0 WHEN title = ?1 THEN 1 ELSE 2 END, file_id
             LIMIT 1",
            DOCUMENT_COLUMNS
        );
        conn.query_row(&sql, params![name], row_to_document)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Document not found: {}", name)))
    }

    /// Get all documents ordered by title
    pub fn get_all(conn: &Connection) -> Result<Vec<Document>> {
        let sql = format!("SELECT {} FROM documents ORDER BY title, file_id", DOCUMENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let documents = stmt
            .query_map([], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }
}
