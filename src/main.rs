use rankfuse::cli::{interrupted, Cli, Commands, ConfigAction};
use rankfuse::config::{expand_path, Config, ConfigValidator};
use rankfuse::embedding::{embed_for_index, FastEmbedProvider, KeywordIndex, VectorIndex};
use rankfuse::error::{RankfuseError, Result};
use rankfuse::retrieval::{
    preview, reciprocal_rank_fusion, DocumentId, FusedEntry, HybridSearcher, RankedList,
    SearchQuery, SearchResults, SearcherSettings, StoredDocument, Subsystem,
};
use rankfuse::storage::StorageManager;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Search {
            query,
            limit,
            lexical_only,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_search(&config, &query, limit, lexical_only, json)?;
        }
        Commands::Fuse {
            file,
            k,
            limit,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_fuse(&config, &file, k, limit, json)?;
        }
        Commands::Add { id, file, summary } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_add(&config, &id, &file, summary)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "rankfuse=debug" } else { "rankfuse=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    lexical_only: bool,
    json: bool,
) -> Result<()> {
    let storage = StorageManager::new(expand_path(&config.storage.data_dir)?)?;

    // Reader only; `add` may hold the writer lock
    let keyword_index =
        KeywordIndex::open_reader(&storage.keyword_index_dir()).map_err(anyhow::Error::from)?;
    let vector_index = VectorIndex::from_embeddings(
        config.embedding.dimension,
        &config.indexing,
        storage.database.embeddings()?,
    )
    .map_err(anyhow::Error::from)?;

    let mut search_query = SearchQuery::new(query, limit.unwrap_or(config.fusion.limit));
    if !lexical_only {
        if let Some(embedding) = embed_query(config, query) {
            search_query = search_query.with_embedding(embedding);
        }
    }

    let searcher = HybridSearcher::new(
        Arc::new(keyword_index),
        Arc::new(vector_index),
        Arc::new(storage.document_store()),
        SearcherSettings::from_config(config)?,
    );

    let rt = tokio::runtime::Runtime::new().map_err(|e| RankfuseError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    let results = rt.block_on(async {
        searcher
            // Ctrl-C abandons the in-flight search
            .search_until(&search_query, interrupted(tokio::signal::ctrl_c()))
            .await
    })?;

    if json {
        print_json(&results)?;
    } else {
        print_search_results(&results);
    }

    Ok(())
}

/// Embed the query text, or `None` so the search degrades to keywords
fn embed_query(config: &Config, query: &str) -> Option<Vec<f32>> {
    let provider = match FastEmbedProvider::new(&config.embedding.model) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!("Embedding model unavailable, searching keywords only: {}", e);
            return None;
        }
    };

    match embed_for_index(&provider, query, config.embedding.dimension) {
        Ok(embedding) => Some(embedding),
        Err(e) => {
            tracing::warn!("Failed to embed query, searching keywords only: {}", e);
            None
        }
    }
}

fn print_search_results(results: &SearchResults) {
    if results.results.is_empty() {
        println!("No results");
    }

    for (position, result) in results.results.iter().enumerate() {
        println!(
            "{:>2}. {}  (score {:.5}, {})",
            position + 1,
            result.document_id,
            result.fused_score,
            describe_ranks(&result.contributing_ranks)
        );
        println!("    {}", result.source_path);
        println!("    {}", result.summary);
    }

    if results.degraded {
        println!("\n⚠ Degraded search: only one subsystem answered");
        for failure in &results.subsystem_failures {
            println!("  - {}", failure);
        }
    }

    if results.dropped > 0 {
        println!(
            "\n⚠ {} result(s) dropped: missing from the document store",
            results.dropped
        );
    }
}

fn describe_ranks(ranks: &std::collections::BTreeMap<Subsystem, usize>) -> String {
    ranks
        .iter()
        .map(|(subsystem, rank)| format!("{} #{}", subsystem, rank))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ranked id lists for the `fuse` command, best first
#[derive(Debug, Default, Deserialize)]
struct FuseInput {
    #[serde(default)]
    lexical: Vec<DocumentId>,
    #[serde(default)]
    vector: Vec<DocumentId>,
}

fn cmd_fuse(
    config: &Config,
    file: &Path,
    k: Option<f64>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(file).map_err(|e| RankfuseError::Io {
        source: e,
        context: format!("Failed to read ranked lists: {:?}", file),
    })?;
    let input: FuseInput = serde_json::from_str(&content).map_err(|e| RankfuseError::Json {
        source: e,
        context: format!("Failed to parse ranked lists: {:?}", file),
    })?;

    let mut fusion = config.fusion_config()?;
    if let Some(k) = k {
        fusion.k = k;
    }
    if let Some(limit) = limit {
        fusion.limit = limit;
    }

    let lists = vec![
        RankedList::from_ids(Subsystem::Lexical, input.lexical)?,
        RankedList::from_ids(Subsystem::Vector, input.vector)?,
    ];
    let fused = reciprocal_rank_fusion(&lists, &fusion)?;

    if json {
        print_json(&fused)?;
    } else {
        print_fused(&fused);
    }

    Ok(())
}

fn print_fused(fused: &[FusedEntry]) {
    for (position, entry) in fused.iter().enumerate() {
        println!(
            "{:>2}. {:<24} {:.5}  {}",
            position + 1,
            entry.document_id.as_str(),
            entry.fused_score,
            describe_ranks(&entry.contributing_ranks)
        );
    }
}

fn cmd_add(config: &Config, id: &str, file: &Path, summary: Option<String>) -> Result<()> {
    let content = std::fs::read_to_string(file).map_err(|e| RankfuseError::Io {
        source: e,
        context: format!("Failed to read document: {:?}", file),
    })?;

    let storage = StorageManager::new(expand_path(&config.storage.data_dir)?)?;
    let id = DocumentId::new(id);

    // Vectors of another dimension would poison the index rebuilt on search
    let embedding = match FastEmbedProvider::new(&config.embedding.model)
        .and_then(|provider| embed_for_index(&provider, &content, config.embedding.dimension))
    {
        Ok(embedding) => Some(embedding),
        Err(e) => {
            tracing::warn!("Storing {} without an embedding: {}", id, e);
            None
        }
    };

    let summary = summary.unwrap_or_else(|| preview(&content, config.search.preview_chars));
    let document = StoredDocument::new(id.clone(), summary, file.display().to_string());
    storage
        .database
        .upsert_document(&document, embedding.as_deref())?;

    let mut keyword_index =
        KeywordIndex::new(storage.keyword_index_dir()).map_err(anyhow::Error::from)?;
    keyword_index
        .upsert(&id, &content)
        .map_err(anyhow::Error::from)?;
    keyword_index.commit().map_err(anyhow::Error::from)?;

    println!("✓ Added {}", id);
    if embedding.is_none() {
        println!("  (keyword index only, no embedding stored)");
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            print_json(&config)?;
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RankfuseError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'rankfuse config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| RankfuseError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}
