//! Collaborator traits for the search engines and the document store

use crate::retrieval::{DocumentId, RankedList};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full-text search engine
///
/// Must return a list tagged `Subsystem::Lexical` with contiguous 1-based ranks.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    async fn query_text(&self, text: &str, limit: usize) -> anyhow::Result<RankedList>;
}

/// Nearest-neighbour search engine over embeddings
///
/// Must return a list tagged `Subsystem::Vector` with contiguous 1-based ranks.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Embedding dimension the index was built with
    fn dimension(&self) -> usize;

    async fn query_vector(&self, embedding: &[f32], limit: usize) -> anyhow::Result<RankedList>;
}

/// Source of display content for document ids
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` means the id is unknown to the store
    async fn fetch(&self, id: &DocumentId) -> anyhow::Result<Option<StoredDocument>>;
}

/// Content kept for a document in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    /// Human-readable summary text
    pub summary: String,
    /// Where the document came from
    pub source_path: String,
    pub indexed_at: Option<DateTime<Utc>>,
}

impl StoredDocument {
    pub fn new(
        id: impl Into<DocumentId>,
        summary: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            source_path: source_path.into(),
            indexed_at: None,
        }
    }
}
