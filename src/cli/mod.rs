//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rankfuse",
    version,
    author = "neur0map",
    about = "Hybrid keyword and semantic search merged with Reciprocal Rank Fusion",
    long_about = "Rankfuse runs a BM25 keyword query and a nearest-neighbour embedding query side by side, \
                  merges the two rankings with Reciprocal Rank Fusion and shows the winning documents. \
                  When one engine fails the other's ranking is returned in degraded mode."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/rankfuse/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Named profile from the config file (e.g., "keyword", "semantic")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search stored documents with keyword and semantic search
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results to return (defaults to fusion.limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip the embedding model and rank by keywords only
        #[arg(long)]
        lexical_only: bool,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Fuse ranked id lists read from a JSON file
    ///
    /// The file holds {"lexical": ["id", ...], "vector": ["id", ...]}, best first.
    Fuse {
        /// Path to the JSON file
        file: PathBuf,

        /// RRF smoothing constant (defaults to fusion.k)
        #[arg(short, long)]
        k: Option<f64>,

        /// Maximum number of fused entries (defaults to fusion.limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Store a document and add it to both indexes
    Add {
        /// Document id
        #[arg(long)]
        id: String,

        /// File whose contents are indexed
        #[arg(long)]
        file: PathBuf,

        /// Summary shown in results (defaults to the start of the file)
        #[arg(long)]
        summary: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Resolve when `signal` fires; never resolve if it could not be registered
///
/// Used as the cancel future for `search`, e.g. `interrupted(tokio::signal::ctrl_c())`.
pub async fn interrupted<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!("Interrupt handler unavailable, search cannot be cancelled: {}", e);
        std::future::pending::<()>().await;
    }
}
