//! Storage layer for rankfuse
//!
//! SQLite holds document content and embeddings; the keyword index lives beside it

pub mod database;
mod document_store;

use crate::error::{RankfuseError, Result};
use std::path::{Path, PathBuf};

pub use database::{Database, DbPool, DbStats};
pub use document_store::{MemoryDocumentStore, SqliteDocumentStore};

/// Storage manager that owns the on-disk layout
pub struct StorageManager {
    pub database: Database,
    base_path: PathBuf,
}

impl StorageManager {
    /// Create a new storage manager rooted at `base_path`
    pub fn new(base_path: PathBuf) -> Result<Self> {
        let store = base_path.join("store");

        for dir in [store.clone(), store.join("keywords")] {
            std::fs::create_dir_all(&dir).map_err(|e| RankfuseError::Io {
                source: e,
                context: format!("Failed to create storage directory: {}", dir.display()),
            })?;
        }

        let database = Database::new(&store.join("db.sqlite"))?;

        Ok(Self {
            database,
            base_path,
        })
    }

    /// Directory holding the database and indexes
    pub fn store_dir(&self) -> PathBuf {
        self.base_path.join("store")
    }

    /// Directory of the Tantivy keyword index
    pub fn keyword_index_dir(&self) -> PathBuf {
        self.store_dir().join("keywords")
    }

    /// Document store view over the database
    pub fn document_store(&self) -> SqliteDocumentStore {
        SqliteDocumentStore::new(self.database.clone())
    }

    /// Get combined storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            db: self.database.stats()?,
            store_size: Self::dir_size(&self.store_dir())?,
        })
    }

    /// Calculate directory size recursively
    fn dir_size(path: &Path) -> Result<u64> {
        let mut size = 0u64;

        if path.is_dir() {
            for entry in std::fs::read_dir(path).map_err(|e| RankfuseError::Io {
                source: e,
                context: format!("Failed to read directory: {}", path.display()),
            })? {
                let entry = entry.map_err(|e| RankfuseError::Io {
                    source: e,
                    context: "Failed to read directory entry".to_string(),
                })?;
                let path = entry.path();

                if path.is_dir() {
                    size += Self::dir_size(&path)?;
                } else {
                    size += entry
                        .metadata()
                        .map_err(|e| RankfuseError::Io {
                            source: e,
                            context: format!("Failed to get file metadata: {}", path.display()),
                        })?
                        .len();
                }
            }
        }

        Ok(size)
    }
}

/// Combined storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub db: DbStats,
    pub store_size: u64,
}

impl StorageStats {
    /// Format size as human-readable string
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path().to_path_buf()).unwrap();

        assert!(storage.store_dir().join("db.sqlite").exists());
        assert!(storage.keyword_index_dir().exists());

        let stats = storage.stats().unwrap();
        assert_eq!(stats.db.document_count, 0);
        assert!(stats.store_size > 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(StorageStats::format_size(0), "0.00 B");
        assert_eq!(StorageStats::format_size(1023), "1023.00 B");
        assert_eq!(StorageStats::format_size(1024), "1.00 KB");
        assert_eq!(StorageStats::format_size(1024 * 1024), "1.00 MB");
    }
}
