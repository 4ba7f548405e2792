//! DocumentStore implementations

use crate::retrieval::{DocumentId, DocumentStore, StoredDocument};
use crate::storage::Database;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Document store backed by the SQLite database
#[derive(Clone)]
pub struct SqliteDocumentStore {
    database: Database,
}

impl SqliteDocumentStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn fetch(&self, id: &DocumentId) -> anyhow::Result<Option<StoredDocument>> {
        let database = self.database.clone();
        let id = id.clone();

        // rusqlite calls block, keep them off the runtime threads
        let document =
            tokio::task::spawn_blocking(move || database.get_document(&id)).await??;

        Ok(document)
    }
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = StoredDocument>) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect();

        Self {
            documents: RwLock::new(documents),
        }
    }

    pub async fn insert(&self, document: StoredDocument) {
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
    }

    pub async fn remove(&self, id: &DocumentId) -> Option<StoredDocument> {
        self.documents.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, id: &DocumentId) -> anyhow::Result<Option<StoredDocument>> {
        Ok(self.documents.read().await.get(id).cloned())
    }
}
