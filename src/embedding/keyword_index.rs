/// Tantivy keyword index for full-text search
use crate::retrieval::{DocumentId, LexicalSearch, RankedList, Subsystem};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

/// Search result with ID and relevance score
#[derive(Debug, Clone)]
pub struct KeywordSearchResult {
    pub id: DocumentId,
    /// BM25 relevance score
    pub score: f32,
}

/// Open the index at `index_path`, creating an empty one if needed
fn open_or_create(index_path: &Path) -> Result<Index, KeywordIndexError> {
    if index_path.join("meta.json").exists() {
        return Index::open_in_dir(index_path)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()));
    }

    std::fs::create_dir_all(index_path)?;

    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("text", TEXT);
    let schema = schema_builder.build();

    Index::create_in_dir(index_path, schema)
        .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))
}

/// Read side of the index
///
/// Holds no writer, so any number of searchers can share a directory with
/// one `KeywordIndex`. Cheap to clone into a blocking task.
#[derive(Clone)]
pub struct KeywordSearcher {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    text_field: Field,
}

impl KeywordSearcher {
    fn from_index(index: Index) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();

        let id_field = schema.get_field("id").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'id' field in schema".to_string())
        })?;

        let text_field = schema.get_field("text").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'text' field in schema".to_string())
        })?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            id_field,
            text_field,
        })
    }

    /// Get the number of documents visible to this reader
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search the index, best match first
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        let searcher = self.reader.searcher();

        // Lenient parsing so stray quotes or operators in user text still match terms
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (query, parse_errors) = query_parser.parse_query_lenient(query);
        if !parse_errors.is_empty() {
            tracing::debug!("Ignored {} query parse errors", parse_errors.len());
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let id = retrieved_doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid ID field".to_string())
                })?;

            // An id surfaces once, at its best-scored hit
            if seen.insert(id.to_string()) {
                results.push(KeywordSearchResult {
                    id: DocumentId::new(id),
                    score,
                });
            }
        }

        Ok(results)
    }
}

/// Tantivy keyword index wrapper
///
/// Provides full-text search with BM25 ranking.
pub struct KeywordIndex {
    searcher: KeywordSearcher,
    writer: IndexWriter,
    index_path: PathBuf,
}

impl KeywordIndex {
    /// Open the index at `index_path` for writing, creating it if needed
    ///
    /// Takes the directory's writer lock; a second writer on the same
    /// directory fails until this one is dropped.
    pub fn new(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        let index = open_or_create(&index_path)?;
        let searcher = KeywordSearcher::from_index(index.clone())?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            searcher,
            writer,
            index_path,
        })
    }

    /// Open the index at `index_path` for searching only, without the writer lock
    pub fn open_reader(index_path: &Path) -> Result<KeywordSearcher, KeywordIndexError> {
        KeywordSearcher::from_index(open_or_create(index_path)?)
    }

    /// Insert or replace a document
    pub fn upsert(&mut self, id: &DocumentId, text: &str) -> Result<(), KeywordIndexError> {
        self.delete(id);

        let doc = doc!(
            self.searcher.id_field => id.as_str(),
            self.searcher.text_field => text,
        );

        self.writer
            .add_document(doc)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    /// Delete a document by ID
    pub fn delete(&mut self, id: &DocumentId) {
        let term = Term::from_field_text(self.searcher.id_field, id.as_str());
        self.writer.delete_term(term);
    }

    /// Commit all pending changes
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        // Wait for reader to reload
        self.searcher
            .reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        tracing::debug!("Committed keyword index at {}", self.index_path.display());
        Ok(())
    }

    /// Search the index, best match first
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        self.searcher.search(query, limit)
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> u64 {
        self.searcher.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LexicalSearch for KeywordSearcher {
    async fn query_text(&self, text: &str, limit: usize) -> anyhow::Result<RankedList> {
        let searcher = self.clone();
        let text = text.to_string();

        let results = tokio::task::spawn_blocking(move || searcher.search(&text, limit)).await??;

        let list = RankedList::from_ordered(
            Subsystem::Lexical,
            results.into_iter().map(|r| (r.id, Some(r.score as f64))),
        )?;

        Ok(list)
    }
}

#[async_trait]
impl LexicalSearch for KeywordIndex {
    async fn query_text(&self, text: &str, limit: usize) -> anyhow::Result<RankedList> {
        self.searcher.query_text(text, limit).await
    }
}
