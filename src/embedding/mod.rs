//! Embedding generation and the reference search engines
//!
//! - EmbeddingProvider trait with a FastEmbed implementation (caller side)
//! - KeywordIndex: Tantivy BM25 index, the lexical subsystem
//! - VectorIndex: HNSW cosine index, the vector subsystem

mod keyword_index;
mod provider;
mod vector_index;

pub use keyword_index::{KeywordIndex, KeywordIndexError, KeywordSearchResult, KeywordSearcher};
pub use provider::{embed_for_index, EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{VectorIndex, VectorIndexError, VectorSearchResult};
