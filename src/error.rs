use crate::retrieval::{DocumentId, Subsystem};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for rankfuse
#[derive(Error, Debug)]
pub enum RankfuseError {
    /// Fusion or search parameters rejected before any I/O
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Query has nothing any subsystem could run
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A ranked list broke the rank/identity invariants
    #[error("Invalid ranked list: {0}")]
    InvalidRankedList(String),

    /// Query embedding does not match the vector index dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Neither subsystem produced a ranked list
    #[error("All subsystems failed (lexical: {lexical}; vector: {vector})")]
    TotalSubsystemFailure {
        lexical: SubsystemError,
        vector: SubsystemError,
    },

    /// Document present in an index but absent from the store
    #[error("Document not found in store: {id}")]
    DocumentNotFound { id: DocumentId },

    /// Caller cancelled the search before both subsystems resolved
    #[error("Search cancelled")]
    Cancelled,

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure scoped to a single subsystem call
///
/// Never fatal on its own: the coordinator degrades to the surviving
/// subsystem and only escalates when every subsystem failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubsystemError {
    #[error("{subsystem} search timed out after {after:?}")]
    Timeout { subsystem: Subsystem, after: Duration },

    #[error("{subsystem} search failed: {message}")]
    Failed { subsystem: Subsystem, message: String },

    #[error("{subsystem} search not queried: {reason}")]
    NotQueried { subsystem: Subsystem, reason: String },
}

impl SubsystemError {
    pub fn subsystem(&self) -> Subsystem {
        match self {
            SubsystemError::Timeout { subsystem, .. }
            | SubsystemError::Failed { subsystem, .. }
            | SubsystemError::NotQueried { subsystem, .. } => *subsystem,
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for rankfuse operations
pub type Result<T> = std::result::Result<T, RankfuseError>;
