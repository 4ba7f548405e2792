//! SQLite database management with migrations
//!
//! Holds document display content and the embeddings the vector index is rebuilt from

use crate::error::{RankfuseError, Result};
use crate::retrieval::{DocumentId, StoredDocument};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RankfuseError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| RankfuseError::Config(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| RankfuseError::Config(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Insert or replace a document and, optionally, its embedding
    pub fn upsert_document(&self, document: &StoredDocument, embedding: Option<&[f32]>) -> Result<()> {
        let conn = self.get_conn()?;
        let indexed_at = document.indexed_at.unwrap_or_else(Utc::now).timestamp();

        conn.execute(
            "INSERT INTO documents (id, summary, source_path, indexed_at, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                summary = excluded.summary,
                source_path = excluded.source_path,
                indexed_at = excluded.indexed_at,
                embedding = excluded.embedding",
            params![
                document.id.as_str(),
                document.summary,
                document.source_path,
                indexed_at,
                embedding.map(encode_embedding),
            ],
        )?;

        Ok(())
    }

    /// Look up one document
    pub fn get_document(&self, id: &DocumentId) -> Result<Option<StoredDocument>> {
        let conn = self.get_conn()?;

        let document = conn
            .query_row(
                "SELECT id, summary, source_path, indexed_at FROM documents WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    let indexed_at: i64 = row.get(3)?;
                    Ok(StoredDocument {
                        id: DocumentId::new(row.get::<_, String>(0)?),
                        summary: row.get(1)?,
                        source_path: row.get(2)?,
                        indexed_at: DateTime::from_timestamp(indexed_at, 0),
                    })
                },
            )
            .optional()?;

        Ok(document)
    }

    /// Delete a document, returning whether it existed
    pub fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        let conn = self.get_conn()?;
        let removed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    /// All stored embeddings, for rebuilding the vector index
    pub fn embeddings(&self) -> Result<Vec<(DocumentId, Vec<f32>)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, embedding FROM documents WHERE embedding IS NOT NULL ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((DocumentId::new(id), decode_embedding(&bytes)))
        })?;

        let mut embeddings = Vec::new();
        for row in rows {
            embeddings.push(row?);
        }

        Ok(embeddings)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let embedded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            embedded_count: embedded_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub document_count: usize,
    pub embedded_count: usize,
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        summary TEXT NOT NULL,
        source_path TEXT NOT NULL,
        indexed_at INTEGER NOT NULL,
        embedding BLOB
    );

    CREATE INDEX idx_documents_indexed_at ON documents(indexed_at);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_embedding_encoding() {
        let embedding = vec![0.25, -1.5, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&embedding)), embedding);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db.sqlite");

        Database::new(&path).unwrap();
        let db = Database::new(&path).unwrap();

        let conn = db.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_upsert_and_get() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("db.sqlite")).unwrap();

        let doc = StoredDocument::new("doc-1", "First summary", "notes/one.md");
        db.upsert_document(&doc, Some(&[1.0, 0.0][..])).unwrap();

        let fetched = db.get_document(&"doc-1".into()).unwrap().unwrap();
        assert_eq!(fetched.summary, "First summary");
        assert_eq!(fetched.source_path, "notes/one.md");
        assert!(fetched.indexed_at.is_some());

        let revised = StoredDocument::new("doc-1", "Revised", "notes/one.md");
        db.upsert_document(&revised, None).unwrap();
        assert_eq!(
            db.get_document(&"doc-1".into()).unwrap().unwrap().summary,
            "Revised"
        );

        let stats = db.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.embedded_count, 0);
    }

    #[test]
    fn test_missing_and_delete() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("db.sqlite")).unwrap();

        assert!(db.get_document(&"nope".into()).unwrap().is_none());

        db.upsert_document(&StoredDocument::new("gone", "s", "p"), None)
            .unwrap();
        assert!(db.delete_document(&"gone".into()).unwrap());
        assert!(!db.delete_document(&"gone".into()).unwrap());
    }

    #[test]
    fn test_embeddings_listing() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("db.sqlite")).unwrap();

        db.upsert_document(&StoredDocument::new("b", "s", "p"), Some(&[0.0, 1.0][..]))
            .unwrap();
        db.upsert_document(&StoredDocument::new("a", "s", "p"), Some(&[1.0, 0.0][..]))
            .unwrap();
        db.upsert_document(&StoredDocument::new("c", "s", "p"), None)
            .unwrap();

        let embeddings = db.embeddings().unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].0.as_str(), "a");
        assert_eq!(embeddings[0].1, vec![1.0, 0.0]);
    }
}
