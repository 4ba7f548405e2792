//! Ranked list data model shared by the fusion engine and the coordinator

use crate::error::{RankfuseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Opaque document identifier, the join key between subsystems
///
/// Ordering is plain string ordering and is used to break score ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Search subsystem that produced a ranked list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Lexical,
    Vector,
}

impl Subsystem {
    pub const ALL: [Subsystem; 2] = [Subsystem::Lexical, Subsystem::Vector];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Lexical => "lexical",
            Subsystem::Vector => "vector",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One position in a subsystem's result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub document_id: DocumentId,
    /// 1-based position, lower is more relevant
    pub rank: usize,
    /// Engine-specific score (BM25, cosine distance, ...); not used by fusion
    pub native_score: Option<f64>,
    pub subsystem: Subsystem,
}

/// Ordered results from exactly one subsystem
///
/// Ranks are always `1..=len` with no repeated document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedList {
    subsystem: Subsystem,
    entries: Vec<RankedEntry>,
}

impl RankedList {
    /// Validate a list of already-ranked entries
    pub fn new(subsystem: Subsystem, entries: Vec<RankedEntry>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            if entry.subsystem != subsystem {
                return Err(RankfuseError::InvalidRankedList(format!(
                    "entry {} is tagged {} in a {} list",
                    entry.document_id, entry.subsystem, subsystem
                )));
            }

            if entry.rank != position + 1 {
                return Err(RankfuseError::InvalidRankedList(format!(
                    "{} list: expected rank {} for {}, got {}",
                    subsystem,
                    position + 1,
                    entry.document_id,
                    entry.rank
                )));
            }

            if !seen.insert(&entry.document_id) {
                return Err(RankfuseError::InvalidRankedList(format!(
                    "{} list: duplicate document {}",
                    subsystem, entry.document_id
                )));
            }
        }

        Ok(Self { subsystem, entries })
    }

    /// Build a list from results in relevance order, assigning ranks by position
    pub fn from_ordered<I, D>(subsystem: Subsystem, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (D, Option<f64>)>,
        D: Into<DocumentId>,
    {
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(position, (id, native_score))| RankedEntry {
                document_id: id.into(),
                rank: position + 1,
                native_score,
                subsystem,
            })
            .collect();

        Self::new(subsystem, entries)
    }

    /// Build a list from bare ids in relevance order
    pub fn from_ids<I, D>(subsystem: Subsystem, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentId>,
    {
        Self::from_ordered(subsystem, ids.into_iter().map(|id| (id, None)))
    }

    pub fn empty(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            entries: Vec::new(),
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the top `limit` entries; ranks stay contiguous
    pub fn truncate(&mut self, limit: usize) {
        self.entries.truncate(limit);
    }
}

/// A document after fusion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedEntry {
    pub document_id: DocumentId,
    /// RRF sum, higher is more relevant
    pub fused_score: f64,
    /// Rank per subsystem; a missing key means that subsystem did not return the document
    pub contributing_ranks: BTreeMap<Subsystem, usize>,
}

impl FusedEntry {
    pub fn rank_in(&self, subsystem: Subsystem) -> Option<usize> {
        self.contributing_ranks.get(&subsystem).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ordered_assigns_ranks() {
        let list = RankedList::from_ordered(
            Subsystem::Vector,
            vec![("a", Some(0.1)), ("b", Some(0.2)), ("c", None)],
        )
        .unwrap();

        let ranks: Vec<usize> = list.entries().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(list.entries()[0].native_score, Some(0.1));
        assert!(list
            .entries()
            .iter()
            .all(|e| e.subsystem == Subsystem::Vector));
    }

    #[test]
    fn test_duplicate_document_rejected() {
        let result = RankedList::from_ids(Subsystem::Lexical, vec!["a", "b", "a"]);
        assert!(matches!(result, Err(RankfuseError::InvalidRankedList(_))));
    }

    #[test]
    fn test_rank_gap_rejected() {
        let entries = vec![
            RankedEntry {
                document_id: "a".into(),
                rank: 1,
                native_score: None,
                subsystem: Subsystem::Lexical,
            },
            RankedEntry {
                document_id: "b".into(),
                rank: 3,
                native_score: None,
                subsystem: Subsystem::Lexical,
            },
        ];

        assert!(RankedList::new(Subsystem::Lexical, entries).is_err());
    }

    #[test]
    fn test_zero_rank_rejected() {
        let entries = vec![RankedEntry {
            document_id: "a".into(),
            rank: 0,
            native_score: None,
            subsystem: Subsystem::Lexical,
        }];

        assert!(RankedList::new(Subsystem::Lexical, entries).is_err());
    }

    #[test]
    fn test_mixed_subsystem_rejected() {
        let entries = vec![RankedEntry {
            document_id: "a".into(),
            rank: 1,
            native_score: None,
            subsystem: Subsystem::Vector,
        }];

        assert!(RankedList::new(Subsystem::Lexical, entries).is_err());
    }

    #[test]
    fn test_truncate_keeps_prefix() {
        let mut list = RankedList::from_ids(Subsystem::Lexical, vec!["a", "b", "c"]).unwrap();
        list.truncate(2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[1].document_id.as_str(), "b");
    }

    #[test]
    fn test_subsystem_order() {
        assert!(Subsystem::Lexical < Subsystem::Vector);
        assert_eq!(Subsystem::Vector.to_string(), "vector");
    }
}
