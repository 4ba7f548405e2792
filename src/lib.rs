//! Rankfuse - Hybrid Retrieval with Reciprocal Rank Fusion
//!
//! Queries a keyword index and a vector index concurrently, fuses the two rankings
//! with Reciprocal Rank Fusion and hydrates the fused ids into displayable results.
//! A failing subsystem degrades the search to the surviving ranking instead of failing it.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{RankfuseError, Result};
