//! Configuration management for rankfuse
//!
//! Loads the TOML configuration, applies profile and environment overrides,
//! and turns the result into the typed settings the retrieval layer consumes.

use crate::error::{RankfuseError, Result};
use crate::retrieval::{CoordinatorSettings, FusionConfig, Subsystem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Schema version written by `config init`
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub fusion: FusionSection,
    pub search: SearchSection,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Reciprocal Rank Fusion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSection {
    pub k: f64,
    pub lexical_weight: f64,
    pub vector_weight: f64,
    pub limit: usize,
}

/// Query execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Candidates fetched per subsystem = limit * search_multiplier
    pub search_multiplier: usize,
    pub lexical_timeout: String,
    pub vector_timeout: String,
    pub preview_chars: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

/// Profile-specific fusion overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RankfuseError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RankfuseError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RankfuseError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RankfuseError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(k) = overrides.k {
            self.fusion.k = k;
        }
        if let Some(weight) = overrides.lexical_weight {
            self.fusion.lexical_weight = weight;
        }
        if let Some(weight) = overrides.vector_weight {
            self.fusion.vector_weight = weight;
        }
        if let Some(limit) = overrides.limit {
            self.fusion.limit = limit;
        }

        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RANKFUSE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `RANKFUSE_`-prefixed key/value overrides, ignoring other keys
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("RANKFUSE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "FUSION__K" => self.fusion.k = parse_value(path, value)?,
            "FUSION__LEXICAL_WEIGHT" => self.fusion.lexical_weight = parse_value(path, value)?,
            "FUSION__VECTOR_WEIGHT" => self.fusion.vector_weight = parse_value(path, value)?,
            "FUSION__LIMIT" => self.fusion.limit = parse_value(path, value)?,
            "SEARCH__LEXICAL_TIMEOUT" => self.search.lexical_timeout = value.to_string(),
            "SEARCH__VECTOR_TIMEOUT" => self.search.vector_timeout = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Fusion parameters as a validated `FusionConfig`
    pub fn fusion_config(&self) -> Result<FusionConfig> {
        let config = FusionConfig::new(self.fusion.k, self.fusion.limit)?
            .with_weight(Subsystem::Lexical, self.fusion.lexical_weight)
            .with_weight(Subsystem::Vector, self.fusion.vector_weight);
        config.validate()?;
        Ok(config)
    }

    /// Subsystem timeouts as `CoordinatorSettings`
    pub fn coordinator_settings(&self) -> Result<CoordinatorSettings> {
        Ok(CoordinatorSettings {
            lexical_timeout: duration_value("search.lexical_timeout", &self.search.lexical_timeout)?,
            vector_timeout: duration_value("search.vector_timeout", &self.search.vector_timeout)?,
        })
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            RankfuseError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("rankfuse").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "keyword".to_string(),
            ProfileOverrides {
                lexical_weight: Some(1.0),
                vector_weight: Some(0.5),
                ..Default::default()
            },
        );
        profiles.insert(
            "semantic".to_string(),
            ProfileOverrides {
                lexical_weight: Some(0.5),
                vector_weight: Some(1.0),
                ..Default::default()
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            fusion: FusionSection {
                k: 60.0,
                lexical_weight: 1.0,
                vector_weight: 1.0,
                limit: 10,
            },
            search: SearchSection {
                search_multiplier: 2,
                lexical_timeout: "2s".to_string(),
                vector_timeout: "2s".to_string(),
                preview_chars: 200,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.rankfuse"),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
            },
            indexing: IndexingConfig {
                hnsw_m: 16,
                hnsw_ef_construction: 200,
                hnsw_ef_search: 64,
            },
            profiles,
        }
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RankfuseError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

fn duration_value(path: &str, value: &str) -> Result<Duration> {
    parse_duration(value).ok_or_else(|| RankfuseError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Invalid duration format: {}", value),
    })
}

/// Parse duration strings like "250ms", "5s", "10m", "1h"; bare numbers are seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => s.split_at(split),
        None => (s, "s"),
    };
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(amount.checked_mul(3600)?)),
        _ => None,
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RankfuseError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RankfuseError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.fusion.k = 20.0;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.fusion.k, 20.0);
        assert_eq!(loaded.search.lexical_timeout, "2s");
        assert!(loaded.profiles.contains_key("semantic"));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(RankfuseError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_profile_overrides_weights() {
        let mut config = Config::default();
        config.apply_profile("semantic").unwrap();

        assert_eq!(config.fusion.lexical_weight, 0.5);
        assert_eq!(config.fusion.vector_weight, 1.0);
        assert!(config.apply_profile("nonexistent").is_err());
    }

    #[test]
    fn test_env_style_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("RANKFUSE_FUSION__K".to_string(), "0".to_string()),
            ("RANKFUSE_FUSION__LIMIT".to_string(), "25".to_string()),
            ("RANKFUSE_SEARCH__VECTOR_TIMEOUT".to_string(), "500ms".to_string()),
            ("RANKFUSE_FUSION__VECTOR_WEIGHT".to_string(), "heavy".to_string()),
            ("HOME".to_string(), "/tmp".to_string()),
        ]);

        assert_eq!(config.fusion.k, 0.0);
        assert_eq!(config.fusion.limit, 25);
        assert_eq!(config.fusion.vector_weight, 1.0);
        assert_eq!(
            config.coordinator_settings().unwrap().vector_timeout,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_fusion_config_from_sections() {
        let mut config = Config::default();
        config.fusion.lexical_weight = 0.3;

        let fusion = config.fusion_config().unwrap();
        assert_eq!(fusion.k, 60.0);
        assert_eq!(fusion.limit, 10);
        assert_eq!(fusion.weight(Subsystem::Lexical), 0.3);
        assert_eq!(fusion.weight(Subsystem::Vector), 1.0);

        config.fusion.limit = 0;
        assert!(matches!(
            config.fusion_config(),
            Err(RankfuseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_expand_path_leaves_absolute_paths() {
        let path = PathBuf::from("/var/lib/rankfuse");
        assert_eq!(expand_path(&path).unwrap(), path);
    }
}
