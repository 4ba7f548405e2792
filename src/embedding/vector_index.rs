/// HNSW vector index for similarity search
use crate::config::IndexingConfig;
use crate::retrieval::{DocumentId, RankedList, Subsystem, VectorSearch};
use async_trait::async_trait;
use hnsw_rs::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Upper bound on HNSW layers
const MAX_LAYER: usize = 16;

/// Capacity hint used when the caller has no better estimate
const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Index lock poisoned")]
    LockPoisoned,
}

/// Search result with ID and cosine distance
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: DocumentId,
    /// Cosine distance (0.0 is identical direction, lower is more similar)
    pub distance: f32,
}

/// Point-id bookkeeping; HNSW points cannot be removed, so replaced ones go stale
#[derive(Default)]
struct PointIds {
    /// Document for every inserted point, indexed by point id
    documents: Vec<DocumentId>,
    /// Current point for each document
    current: HashMap<DocumentId, usize>,
}

impl PointIds {
    fn is_current(&self, point: usize) -> bool {
        self.documents
            .get(point)
            .and_then(|doc| self.current.get(doc))
            .is_some_and(|current| *current == point)
    }

    fn stale_count(&self) -> usize {
        self.documents.len() - self.current.len()
    }
}

/// HNSW vector index wrapper
///
/// Provides approximate nearest neighbor search with cosine distance.
pub struct VectorIndex {
    index: Arc<Hnsw<'static, f32, DistCosine>>,
    points: Arc<RwLock<PointIds>>,
    dimension: usize,
    ef_search: usize,
}

impl VectorIndex {
    /// Create a new, empty vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `config` - HNSW parameters
    pub fn new(dimension: usize, config: &IndexingConfig) -> Self {
        Self::with_capacity(dimension, config, DEFAULT_CAPACITY)
    }

    /// Create an empty index sized for roughly `capacity` vectors
    pub fn with_capacity(dimension: usize, config: &IndexingConfig, capacity: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            config.hnsw_m,
            capacity.max(1),
            MAX_LAYER,
            config.hnsw_ef_construction,
            DistCosine,
        );

        Self {
            index: Arc::new(index),
            points: Arc::new(RwLock::new(PointIds::default())),
            dimension,
            ef_search: config.hnsw_ef_search,
        }
    }

    /// Build an index from stored (id, embedding) pairs
    ///
    /// Rows whose length differs from `dimension` were written under another
    /// model; they are skipped with a warning rather than failing the build.
    pub fn from_embeddings(
        dimension: usize,
        config: &IndexingConfig,
        embeddings: Vec<(DocumentId, Vec<f32>)>,
    ) -> Result<Self, VectorIndexError> {
        let index = Self::with_capacity(dimension, config, embeddings.len().max(DEFAULT_CAPACITY));

        let mut skipped = 0;
        for (id, vector) in &embeddings {
            if vector.len() != dimension {
                tracing::warn!(
                    "Skipping embedding for {}: {} dimensions, index expects {}",
                    id,
                    vector.len(),
                    dimension
                );
                skipped += 1;
                continue;
            }
            index.insert(id, vector)?;
        }

        tracing::info!(
            "Built vector index with {} embeddings ({} skipped)",
            embeddings.len() - skipped,
            skipped
        );
        Ok(index)
    }

    /// Insert a vector, replacing any earlier vector for the same document
    pub fn insert(&self, id: &DocumentId, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut points = self
            .points
            .write()
            .map_err(|_| VectorIndexError::LockPoisoned)?;
        let point = points.documents.len();

        let data = vector.to_vec();
        self.index.insert((&data, point));

        points.documents.push(id.clone());
        points.current.insert(id.clone(), point);

        Ok(())
    }

    /// Search for the `k` nearest documents, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorSearchResult>, VectorIndexError> {
        search_points(&self.index, &self.points, self.dimension, self.ef_search, query, k)
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> usize {
        self.points.read().map(|p| p.current.len()).unwrap_or(0)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn search_points(
    index: &Hnsw<'static, f32, DistCosine>,
    points: &RwLock<PointIds>,
    dimension: usize,
    ef_search: usize,
    query: &[f32],
    k: usize,
) -> Result<Vec<VectorSearchResult>, VectorIndexError> {
    if query.len() != dimension {
        return Err(VectorIndexError::InvalidDimension {
            expected: dimension,
            actual: query.len(),
        });
    }

    let points = points.read().map_err(|_| VectorIndexError::LockPoisoned)?;
    if k == 0 || points.current.is_empty() {
        return Ok(Vec::new());
    }

    // Over-fetch so stale points do not eat into the k results
    let wanted = k + points.stale_count();
    let neighbours = index.search(query, wanted, ef_search.max(wanted));

    let mut seen = HashSet::new();
    let results = neighbours
        .into_iter()
        .filter(|n| points.is_current(n.d_id))
        .filter_map(|n| {
            let id = points.documents[n.d_id].clone();
            seen.insert(id.clone()).then_some(VectorSearchResult {
                id,
                distance: n.distance,
            })
        })
        .take(k)
        .collect();

    Ok(results)
}

#[async_trait]
impl VectorSearch for VectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn query_vector(&self, embedding: &[f32], limit: usize) -> anyhow::Result<RankedList> {
        let index = Arc::clone(&self.index);
        let points = Arc::clone(&self.points);
        let (dimension, ef_search) = (self.dimension, self.ef_search);
        let query = embedding.to_vec();

        let results = tokio::task::spawn_blocking(move || {
            search_points(&index, &points, dimension, ef_search, &query, limit)
        })
        .await??;

        let list = RankedList::from_ordered(
            Subsystem::Vector,
            results.into_iter().map(|r| (r.id, Some(r.distance as f64))),
        )?;

        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config() -> IndexingConfig {
        Config::default().indexing
    }

    fn axis(dimension: usize, hot: usize, weight: f32) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[hot] = weight;
        v
    }

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new(384, &config());

        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let index = VectorIndex::new(8, &config());

        let mut near = axis(8, 0, 0.9);
        near[1] = 0.1;

        index.insert(&"x".into(), &axis(8, 0, 1.0)).unwrap();
        index.insert(&"y".into(), &axis(8, 1, 1.0)).unwrap();
        index.insert(&"near-x".into(), &near).unwrap();

        assert_eq!(index.len(), 3);

        let results = index.search(&axis(8, 0, 1.0), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.as_str(), "x");
        assert_eq!(results[1].id.as_str(), "near-x");
        assert!(results[0].distance < 0.01);
    }

    #[test]
    fn test_reinsert_replaces_vector() {
        let index = VectorIndex::new(4, &config());

        index.insert(&"moving".into(), &axis(4, 0, 1.0)).unwrap();
        index.insert(&"still".into(), &axis(4, 2, 1.0)).unwrap();
        index.insert(&"moving".into(), &axis(4, 3, 1.0)).unwrap();

        assert_eq!(index.len(), 2);

        let results = index.search(&axis(4, 3, 1.0), 5).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.iter().filter(|id| **id == "moving").count(), 1);
        assert_eq!(ids[0], "moving");
    }

    #[test]
    fn test_dimension_validation() {
        let index = VectorIndex::new(384, &config());

        assert!(matches!(
            index.insert(&"bad".into(), &vec![1.0; 128]),
            Err(VectorIndexError::InvalidDimension { expected: 384, actual: 128 })
        ));
        assert!(index.search(&vec![1.0; 10], 1).is_err());
    }

    #[test]
    fn test_from_embeddings() {
        let embeddings = (0..5)
            .map(|i| (DocumentId::new(format!("doc-{}", i)), axis(5, i, 1.0)))
            .collect();

        let index = VectorIndex::from_embeddings(5, &config(), embeddings).unwrap();
        assert_eq!(index.len(), 5);

        let results = index.search(&axis(5, 3, 1.0), 1).unwrap();
        assert_eq!(results[0].id.as_str(), "doc-3");
    }

    #[test]
    fn test_from_embeddings_skips_other_dimensions() {
        let embeddings = vec![
            (DocumentId::new("fits"), axis(4, 0, 1.0)),
            (DocumentId::new("wider"), vec![1.0; 768]),
            (DocumentId::new("also-fits"), axis(4, 1, 1.0)),
        ];

        let index = VectorIndex::from_embeddings(4, &config(), embeddings).unwrap();
        assert_eq!(index.len(), 2);

        let ids: Vec<String> = index
            .search(&axis(4, 0, 1.0), 5)
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert!(!ids.contains(&"wider".to_string()));
    }

    #[tokio::test]
    async fn test_query_vector_returns_ranked_list() {
        let index = VectorIndex::new(3, &config());
        index.insert(&"a".into(), &[1.0, 0.0, 0.0]).unwrap();
        index.insert(&"b".into(), &[0.0, 1.0, 0.0]).unwrap();

        let list = index.query_vector(&[0.0, 1.0, 0.1], 10).await.unwrap();
        assert_eq!(list.subsystem(), Subsystem::Vector);
        assert_eq!(list.entries()[0].document_id.as_str(), "b");
        assert_eq!(list.entries()[0].rank, 1);
        assert_eq!(list.len(), 2);
    }
}
