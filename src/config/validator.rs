use crate::config::{parse_duration, Config, ProfileOverrides, SCHEMA_VERSION};
use crate::error::{RankfuseError, Result, ValidationError};
use crate::retrieval::MAX_WEIGHT;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_fusion(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_profiles(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RankfuseError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_fusion(config: &Config, errors: &mut Vec<ValidationError>) {
        let fusion = &config.fusion;

        // k = 0 is allowed and means plain 1/rank
        if !fusion.k.is_finite() || fusion.k < 0.0 {
            errors.push(ValidationError::new(
                "fusion.k",
                format!("k must be a finite number >= 0, got {}", fusion.k),
            ));
        }

        Self::check_weight("fusion.lexical_weight", fusion.lexical_weight, errors);
        Self::check_weight("fusion.vector_weight", fusion.vector_weight, errors);

        if fusion.limit == 0 {
            errors.push(ValidationError::new(
                "fusion.limit",
                "Limit must be greater than 0",
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.search.search_multiplier == 0 {
            errors.push(ValidationError::new(
                "search.search_multiplier",
                "Search multiplier must be at least 1",
            ));
        }

        for (path, value) in [
            ("search.lexical_timeout", &config.search.lexical_timeout),
            ("search.vector_timeout", &config.search.vector_timeout),
        ] {
            match parse_duration(value) {
                Some(d) if d.is_zero() => {
                    errors.push(ValidationError::new(path, "Timeout must be greater than 0"))
                }
                Some(_) => {}
                None => errors.push(ValidationError::new(
                    path,
                    format!("Invalid duration format: {}", value),
                )),
            }
        }

        if config.search.preview_chars == 0 {
            errors.push(ValidationError::new(
                "search.preview_chars",
                "Preview length must be greater than 0",
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }
    }

    fn validate_profiles(config: &Config, errors: &mut Vec<ValidationError>) {
        for (name, overrides) in &config.profiles {
            let ProfileOverrides {
                k,
                lexical_weight,
                vector_weight,
                limit,
            } = overrides;

            if let Some(k) = k {
                if !k.is_finite() || *k < 0.0 {
                    errors.push(ValidationError::new(
                        format!("profiles.{}.k", name),
                        format!("k must be a finite number >= 0, got {}", k),
                    ));
                }
            }
            if let Some(weight) = lexical_weight {
                Self::check_weight(&format!("profiles.{}.lexical_weight", name), *weight, errors);
            }
            if let Some(weight) = vector_weight {
                Self::check_weight(&format!("profiles.{}.vector_weight", name), *weight, errors);
            }
            if *limit == Some(0) {
                errors.push(ValidationError::new(
                    format!("profiles.{}.limit", name),
                    "Limit must be greater than 0",
                ));
            }
        }
    }

    fn check_weight(path: &str, weight: f64, errors: &mut Vec<ValidationError>) {
        if !weight.is_finite() || weight <= 0.0 || weight > MAX_WEIGHT {
            errors.push(ValidationError::new(
                path,
                format!("Weight must be in (0, {}], got {}", MAX_WEIGHT, weight),
            ));
        }
    }
}
