//! Concurrent fan-out to the lexical and vector subsystems

use crate::error::{RankfuseError, Result, SubsystemError};
use crate::retrieval::{
    reciprocal_rank_fusion, FusedEntry, FusionConfig, LexicalSearch, RankedList, Subsystem,
    VectorSearch,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-subsystem call budgets
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub lexical_timeout: Duration,
    pub vector_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            lexical_timeout: Duration::from_secs(2),
            vector_timeout: Duration::from_secs(2),
        }
    }
}

/// One logical hybrid query
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Text for the lexical subsystem; blank skips it
    pub text: String,

    /// Query embedding for the vector subsystem; `None` skips it
    pub embedding: Option<Vec<f32>>,

    /// Entries requested from each subsystem, at least `config.limit`
    pub per_subsystem_limit: usize,

    pub config: FusionConfig,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>, config: FusionConfig) -> Self {
        Self {
            text: text.into(),
            embedding: None,
            per_subsystem_limit: config.limit,
            config,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_per_subsystem_limit(mut self, limit: usize) -> Self {
        self.per_subsystem_limit = limit;
        self
    }
}

/// Which lists went into the fused ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "source")]
pub enum SearchMode {
    /// Both subsystems answered
    Fused,
    /// Only the named subsystem answered
    Degraded(Subsystem),
}

/// Joint result of the two subsystem calls
#[derive(Debug)]
pub enum DispatchOutcome {
    BothSucceeded {
        lexical: RankedList,
        vector: RankedList,
    },
    OneFailed {
        survivor: RankedList,
        failure: SubsystemError,
    },
    BothFailed {
        lexical: SubsystemError,
        vector: SubsystemError,
    },
}

impl DispatchOutcome {
    pub fn from_results(
        lexical: std::result::Result<RankedList, SubsystemError>,
        vector: std::result::Result<RankedList, SubsystemError>,
    ) -> Self {
        match (lexical, vector) {
            (Ok(lexical), Ok(vector)) => DispatchOutcome::BothSucceeded { lexical, vector },
            (Ok(survivor), Err(failure)) | (Err(failure), Ok(survivor)) => {
                DispatchOutcome::OneFailed { survivor, failure }
            }
            (Err(lexical), Err(vector)) => DispatchOutcome::BothFailed { lexical, vector },
        }
    }
}

/// Fused ranking plus the information needed to judge how much to trust it
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub entries: Vec<FusedEntry>,
    pub mode: SearchMode,
    /// Subsystem failures tolerated while producing `entries`
    #[serde(skip)]
    pub failures: Vec<SubsystemError>,
}

impl SearchResponse {
    pub fn is_degraded(&self) -> bool {
        matches!(self.mode, SearchMode::Degraded(_))
    }
}

/// Issues both subsystem queries concurrently and fuses whatever survives
pub struct QueryCoordinator {
    lexical: Arc<dyn LexicalSearch>,
    vector: Arc<dyn VectorSearch>,
    settings: CoordinatorSettings,
}

impl QueryCoordinator {
    pub fn new(
        lexical: Arc<dyn LexicalSearch>,
        vector: Arc<dyn VectorSearch>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            lexical,
            vector,
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Run a hybrid query
    ///
    /// Dropping the returned future cancels both in-flight subsystem calls.
    pub async fn search(&self, request: &QueryRequest) -> Result<SearchResponse> {
        self.check_preconditions(request)?;
        let outcome = self.dispatch(request).await;
        Self::fuse(outcome, &request.config)
    }

    /// Run a hybrid query that is abandoned as soon as `cancel` resolves
    pub async fn search_until<C>(&self, request: &QueryRequest, cancel: C) -> Result<SearchResponse>
    where
        C: Future<Output = ()>,
    {
        self.check_preconditions(request)?;

        tokio::select! {
            biased;
            _ = cancel => {
                info!("Search cancelled, discarding in-flight subsystem calls");
                Err(RankfuseError::Cancelled)
            }
            outcome = self.dispatch(request) => Self::fuse(outcome, &request.config),
        }
    }

    fn check_preconditions(&self, request: &QueryRequest) -> Result<()> {
        request.config.validate()?;

        if request.per_subsystem_limit < request.config.limit {
            return Err(RankfuseError::InvalidConfig(format!(
                "per-subsystem limit ({}) must be at least the fused limit ({})",
                request.per_subsystem_limit, request.config.limit
            )));
        }

        if let Some(embedding) = &request.embedding {
            let expected = self.vector.dimension();
            if embedding.len() != expected {
                return Err(RankfuseError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        if request.text.trim().is_empty() && request.embedding.is_none() {
            return Err(RankfuseError::InvalidQuery(
                "query needs text, an embedding, or both".to_string(),
            ));
        }

        Ok(())
    }

    async fn dispatch(&self, request: &QueryRequest) -> DispatchOutcome {
        let limit = request.per_subsystem_limit;
        let text = request.text.trim();

        let lexical = async {
            if text.is_empty() {
                return Err(SubsystemError::NotQueried {
                    subsystem: Subsystem::Lexical,
                    reason: "blank query text".to_string(),
                });
            }
            run_subsystem(
                Subsystem::Lexical,
                self.settings.lexical_timeout,
                limit,
                self.lexical.query_text(text, limit),
            )
            .await
        };

        let vector = async {
            match &request.embedding {
                Some(embedding) => {
                    run_subsystem(
                        Subsystem::Vector,
                        self.settings.vector_timeout,
                        limit,
                        self.vector.query_vector(embedding, limit),
                    )
                    .await
                }
                None => Err(SubsystemError::NotQueried {
                    subsystem: Subsystem::Vector,
                    reason: "no query embedding".to_string(),
                }),
            }
        };

        debug!("Dispatching lexical and vector queries (limit {})", limit);
        let (lexical, vector) = tokio::join!(lexical, vector);

        DispatchOutcome::from_results(lexical, vector)
    }

    fn fuse(outcome: DispatchOutcome, config: &FusionConfig) -> Result<SearchResponse> {
        match outcome {
            DispatchOutcome::BothSucceeded { lexical, vector } => {
                let entries = reciprocal_rank_fusion(&[lexical, vector], config)?;
                debug!("Fused {} entries from both subsystems", entries.len());
                Ok(SearchResponse {
                    entries,
                    mode: SearchMode::Fused,
                    failures: Vec::new(),
                })
            }
            DispatchOutcome::OneFailed { survivor, failure } => {
                let source = survivor.subsystem();
                warn!(
                    subsystem = %failure.subsystem(),
                    "Degraded search, using {} results only: {}",
                    source,
                    failure
                );
                let entries = reciprocal_rank_fusion(&[survivor], config)?;
                Ok(SearchResponse {
                    entries,
                    mode: SearchMode::Degraded(source),
                    failures: vec![failure],
                })
            }
            DispatchOutcome::BothFailed { lexical, vector } => {
                warn!("Both subsystems failed: {}; {}", lexical, vector);
                Err(RankfuseError::TotalSubsystemFailure { lexical, vector })
            }
        }
    }
}

/// Await one subsystem call under its own timeout
async fn run_subsystem<F>(
    subsystem: Subsystem,
    timeout: Duration,
    limit: usize,
    call: F,
) -> std::result::Result<RankedList, SubsystemError>
where
    F: Future<Output = anyhow::Result<RankedList>>,
{
    let started = Instant::now();

    match tokio::time::timeout(timeout, call).await {
        Err(_) => Err(SubsystemError::Timeout {
            subsystem,
            after: timeout,
        }),
        Ok(Err(e)) => Err(SubsystemError::Failed {
            subsystem,
            message: format!("{:#}", e),
        }),
        Ok(Ok(list)) if list.subsystem() != subsystem => Err(SubsystemError::Failed {
            subsystem,
            message: format!("engine returned a {} list", list.subsystem()),
        }),
        Ok(Ok(mut list)) => {
            list.truncate(limit);
            debug!(
                "{} search returned {} entries in {}ms",
                subsystem,
                list.len(),
                started.elapsed().as_millis()
            );
            Ok(list)
        }
    }
}
