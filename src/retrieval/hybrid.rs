//! Hybrid search combining lexical and semantic search

use crate::config::Config;
use crate::error::{RankfuseError, Result};
use crate::retrieval::{
    CoordinatorSettings, DisplayResult, DocumentStore, FusionConfig, HydrationFailure, LexicalSearch,
    QueryCoordinator, QueryRequest, ResultPresenter, SearchMode, SearchQuery, SearchResponse,
    VectorSearch,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Knobs the searcher applies to every query
#[derive(Debug, Clone)]
pub struct SearcherSettings {
    /// k and weights; the limit is replaced by each query's limit
    pub fusion: FusionConfig,
    pub coordinator: CoordinatorSettings,
    /// Per-subsystem limit = limit * multiplier when a query does not set one
    pub search_multiplier: usize,
    pub preview_chars: Option<usize>,
}

impl Default for SearcherSettings {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            coordinator: CoordinatorSettings::default(),
            search_multiplier: 2,
            preview_chars: None,
        }
    }
}

impl SearcherSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            fusion: config.fusion_config()?,
            coordinator: config.coordinator_settings()?,
            search_multiplier: config.search.search_multiplier,
            preview_chars: Some(config.search.preview_chars),
        })
    }
}

/// Final answer for one search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub request_id: Uuid,
    pub results: Vec<DisplayResult>,
    pub mode: SearchMode,
    /// True when only one subsystem contributed
    pub degraded: bool,
    /// Fused entries dropped during hydration
    pub dropped: usize,
    pub subsystem_failures: Vec<String>,
    pub hydration_failures: Vec<HydrationFailure>,
}

/// Hybrid searcher combining the query coordinator and the result presenter
pub struct HybridSearcher {
    coordinator: QueryCoordinator,
    presenter: ResultPresenter,
    settings: SearcherSettings,
}

impl HybridSearcher {
    /// Create a new hybrid searcher
    pub fn new(
        lexical: Arc<dyn LexicalSearch>,
        vector: Arc<dyn VectorSearch>,
        store: Arc<dyn DocumentStore>,
        settings: SearcherSettings,
    ) -> Self {
        let coordinator = QueryCoordinator::new(lexical, vector, settings.coordinator.clone());

        let presenter = match settings.preview_chars {
            Some(max_chars) => ResultPresenter::new(store).with_preview_chars(max_chars),
            None => ResultPresenter::new(store),
        };

        Self {
            coordinator,
            presenter,
            settings,
        }
    }

    /// Perform hybrid search
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let request_id = Uuid::new_v4();
        let request = self.build_request(query);

        async {
            let response = self.coordinator.search(&request).await?;
            Ok(self.present(request_id, response).await)
        }
        .instrument(info_span!("search", %request_id))
        .await
    }

    /// Perform hybrid search, giving up when `cancel` resolves first
    pub async fn search_until<C>(&self, query: &SearchQuery, cancel: C) -> Result<SearchResults>
    where
        C: Future<Output = ()>,
    {
        let request_id = Uuid::new_v4();
        let request = self.build_request(query);

        async {
            tokio::pin!(cancel);

            let response = self
                .coordinator
                .search_until(&request, cancel.as_mut())
                .await?;

            // Hydration is abandoned too if the caller cancels after fusion
            tokio::select! {
                biased;
                _ = cancel.as_mut() => {
                    info!("Search cancelled during hydration");
                    Err(RankfuseError::Cancelled)
                }
                results = self.present(request_id, response) => Ok(results),
            }
        }
        .instrument(info_span!("search", %request_id))
        .await
    }

    fn build_request(&self, query: &SearchQuery) -> QueryRequest {
        let config = self.settings.fusion.clone().with_limit(query.limit);
        let per_subsystem_limit = query
            .per_subsystem_limit
            .unwrap_or_else(|| query.limit.saturating_mul(self.settings.search_multiplier.max(1)));

        let request = QueryRequest::new(query.text.clone(), config)
            .with_per_subsystem_limit(per_subsystem_limit);

        match &query.embedding {
            Some(embedding) => request.with_embedding(embedding.clone()),
            None => request,
        }
    }

    async fn present(&self, request_id: Uuid, response: SearchResponse) -> SearchResults {
        let degraded = response.is_degraded();
        let subsystem_failures = response.failures.iter().map(|f| f.to_string()).collect();

        let report = self.presenter.hydrate(response.entries).await;
        let dropped = report.dropped();

        info!(
            results = report.results.len(),
            dropped,
            degraded,
            "Search complete"
        );

        SearchResults {
            request_id,
            results: report.results,
            mode: response.mode,
            degraded,
            dropped,
            subsystem_failures,
            hydration_failures: report.failures,
        }
    }
}
