//! Reciprocal Rank Fusion algorithm for combining search results

use crate::error::{RankfuseError, Result};
use crate::retrieval::{DocumentId, FusedEntry, RankedList, Subsystem};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default RRF constant
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Default number of fused results
pub const DEFAULT_LIMIT: usize = 10;

/// Largest accepted subsystem weight; keeps every fused score finite
pub const MAX_WEIGHT: f64 = 1e6;

/// Configuration for fusion algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// RRF K constant (typically 60); 0 means plain 1/rank
    pub k: f64,

    /// Per-subsystem multiplier, missing subsystems weigh 1.0
    #[serde(default)]
    pub weights: BTreeMap<Subsystem, f64>,

    /// Maximum number of fused results
    pub limit: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            weights: BTreeMap::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl FusionConfig {
    pub fn new(k: f64, limit: usize) -> Result<Self> {
        let config = Self {
            k,
            weights: BTreeMap::new(),
            limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_weight(mut self, subsystem: Subsystem, weight: f64) -> Self {
        self.weights.insert(subsystem, weight);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn weight(&self, subsystem: Subsystem) -> f64 {
        self.weights.get(&subsystem).copied().unwrap_or(1.0)
    }

    /// Reject bad k, limit or weights
    pub fn validate(&self) -> Result<()> {
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(RankfuseError::InvalidConfig(format!(
                "k must be a finite number >= 0, got {}",
                self.k
            )));
        }

        if self.limit == 0 {
            return Err(RankfuseError::InvalidConfig(
                "limit must be greater than 0".to_string(),
            ));
        }

        for (subsystem, weight) in &self.weights {
            if !weight.is_finite() || *weight <= 0.0 || *weight > MAX_WEIGHT {
                return Err(RankfuseError::InvalidConfig(format!(
                    "{} weight must be in (0, {}], got {}",
                    subsystem, MAX_WEIGHT, weight
                )));
            }
        }

        Ok(())
    }
}

/// Apply Reciprocal Rank Fusion to any number of ranked lists
///
/// RRF formula: score(id) = sum over all rankings of: weight / (k + rank)
///
/// A document ranked by a single subsystem still receives that subsystem's
/// contribution. Output is sorted by score descending, ties broken by the
/// smallest document id, then truncated to `config.limit`.
///
/// # Arguments
/// * `lists` - At most one ranked list per subsystem, in any order
/// * `config` - Fusion configuration
pub fn reciprocal_rank_fusion(lists: &[RankedList], config: &FusionConfig) -> Result<Vec<FusedEntry>> {
    config.validate()?;

    let mut subsystems = BTreeSet::new();
    for list in lists {
        if !subsystems.insert(list.subsystem()) {
            return Err(RankfuseError::InvalidRankedList(format!(
                "more than one {} list supplied",
                list.subsystem()
            )));
        }
    }

    let mut ranks: AHashMap<&DocumentId, BTreeMap<Subsystem, usize>> = AHashMap::new();
    for list in lists {
        for entry in list.entries() {
            ranks
                .entry(&entry.document_id)
                .or_default()
                .insert(list.subsystem(), entry.rank);
        }
    }

    // Summing in subsystem order keeps scores bit-identical whatever the list order
    let mut fused: Vec<FusedEntry> = ranks
        .into_iter()
        .map(|(document_id, contributing_ranks)| {
            let fused_score: f64 = contributing_ranks
                .iter()
                .map(|(subsystem, rank)| config.weight(*subsystem) / (config.k + *rank as f64))
                .sum();

            FusedEntry {
                document_id: document_id.clone(),
                fused_score,
                contributing_ranks,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    fused.truncate(config.limit);

    Ok(fused)
}
