//! Hybrid retrieval
//!
//! Runs lexical and semantic search side by side, merges the two rankings
//! with Reciprocal Rank Fusion and hydrates the winners from the document store.

mod backend;
mod coordinator;
mod fusion;
mod hybrid;
mod presenter;
mod types;

pub use backend::{DocumentStore, LexicalSearch, StoredDocument, VectorSearch};
pub use coordinator::{
    CoordinatorSettings, DispatchOutcome, QueryCoordinator, QueryRequest, SearchMode,
    SearchResponse,
};
pub use fusion::{reciprocal_rank_fusion, FusionConfig, DEFAULT_LIMIT, DEFAULT_RRF_K, MAX_WEIGHT};
pub use hybrid::{HybridSearcher, SearchResults, SearcherSettings};
pub use presenter::{preview, DisplayResult, HydrationFailure, HydrationReport, ResultPresenter};
pub use types::{DocumentId, FusedEntry, RankedEntry, RankedList, Subsystem};

use serde::{Deserialize, Serialize};

/// Search query as issued by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Query embedding, produced by the caller's embedding provider
    pub embedding: Option<Vec<f32>>,

    /// Maximum number of results
    pub limit: usize,

    /// Entries requested from each subsystem; defaults to limit * search multiplier
    pub per_subsystem_limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            embedding: None,
            limit,
            per_subsystem_limit: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}
