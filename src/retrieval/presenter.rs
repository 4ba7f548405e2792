//! Hydration of fused document ids into displayable results

use crate::error::RankfuseError;
use crate::retrieval::{DocumentId, DocumentStore, FusedEntry, Subsystem};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A fused result with its stored content
#[derive(Debug, Clone, Serialize)]
pub struct DisplayResult {
    pub document_id: DocumentId,

    /// RRF score (higher is better)
    pub fused_score: f64,

    pub contributing_ranks: BTreeMap<Subsystem, usize>,

    /// Summary text, possibly shortened to the preview length
    pub summary: String,

    pub source_path: String,

    pub indexed_at: Option<DateTime<Utc>>,
}

/// Why a fused entry could not be hydrated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HydrationFailure {
    /// Indexed but missing from the store (index/store drift)
    NotFound { document_id: DocumentId },
    /// The store itself failed for this id
    Store {
        document_id: DocumentId,
        message: String,
    },
}

impl HydrationFailure {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            HydrationFailure::NotFound { document_id }
            | HydrationFailure::Store { document_id, .. } => document_id,
        }
    }

    pub fn to_error(&self) -> RankfuseError {
        match self {
            HydrationFailure::NotFound { document_id } => RankfuseError::DocumentNotFound {
                id: document_id.clone(),
            },
            HydrationFailure::Store {
                document_id,
                message,
            } => RankfuseError::Other(anyhow::anyhow!(
                "store lookup for {} failed: {}",
                document_id,
                message
            )),
        }
    }
}

/// Hydrated results plus the entries that had to be dropped
#[derive(Debug, Clone, Default, Serialize)]
pub struct HydrationReport {
    pub results: Vec<DisplayResult>,
    pub failures: Vec<HydrationFailure>,
}

impl HydrationReport {
    /// Number of fused entries missing from `results`
    pub fn dropped(&self) -> usize {
        self.failures.len()
    }
}

/// Maps fused ids back to stored content
pub struct ResultPresenter {
    store: Arc<dyn DocumentStore>,
    preview_chars: Option<usize>,
}

impl ResultPresenter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            preview_chars: None,
        }
    }

    /// Shorten summaries longer than `max_chars`
    pub fn with_preview_chars(mut self, max_chars: usize) -> Self {
        self.preview_chars = Some(max_chars);
        self
    }

    /// Fetch every entry from the store, keeping fused order
    ///
    /// Lookups that fail are dropped and reported, never fatal to the batch.
    pub async fn hydrate(&self, entries: Vec<FusedEntry>) -> HydrationReport {
        let mut report = HydrationReport::default();

        for entry in entries {
            match self.store.fetch(&entry.document_id).await {
                Ok(Some(document)) => {
                    let summary = match self.preview_chars {
                        Some(max_chars) => preview(&document.summary, max_chars),
                        None => document.summary,
                    };

                    report.results.push(DisplayResult {
                        document_id: entry.document_id,
                        fused_score: entry.fused_score,
                        contributing_ranks: entry.contributing_ranks,
                        summary,
                        source_path: document.source_path,
                        indexed_at: document.indexed_at,
                    });
                }
                Ok(None) => {
                    let failure = HydrationFailure::NotFound {
                        document_id: entry.document_id,
                    };
                    warn!("Dropping result: {}", failure.to_error());
                    report.failures.push(failure);
                }
                Err(e) => {
                    let failure = HydrationFailure::Store {
                        document_id: entry.document_id,
                        message: format!("{:#}", e),
                    };
                    warn!("Dropping result: {}", failure.to_error());
                    report.failures.push(failure);
                }
            }
        }

        debug!(
            "Hydrated {} results, dropped {}",
            report.results.len(),
            report.dropped()
        );

        report
    }
}

/// Get a short preview of the text (first N characters)
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_not_found_maps_to_error() {
        let failure = HydrationFailure::NotFound {
            document_id: "gone".into(),
        };
        assert_eq!(failure.document_id().as_str(), "gone");
        assert!(matches!(
            failure.to_error(),
            RankfuseError::DocumentNotFound { .. }
        ));
    }
}
