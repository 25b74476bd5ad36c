//! Configuration management for feedlens
//!
//! Loads the TOML configuration file, applies profile and environment
//! overrides, and validates the result before anything else is constructed.

use crate::error::{FeedlensError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub suggestions: SuggestionConfig,
    pub backfill: BackfillConfig,
    pub classification: ClassificationConfig,
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

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Path of the SQLite database inside the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(expand_tilde(&self.data_dir)?.join("feedback.sqlite"))
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "offline" (local fastembed model) or "online" (HTTP embedding service)
    pub mode: String,
    pub model: String,
    /// Endpoint of the embedding service, used in online mode
    #[serde(default)]
    pub endpoint: String,
    /// Name of the environment variable holding the API key, if any
    #[serde(default)]
    pub api_key_env: String,
    /// Expected vector dimensionality; 0 means "accept what the provider returns"
    #[serde(default)]
    pub dimension: usize,
    pub max_input_chars: usize,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl EmbeddingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Search defaults and boundary limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_threshold: f32,
    pub use_hybrid: bool,
    pub text_weight: f32,
    pub vector_weight: f32,
    /// Most-recent embedded items considered by one vector scan
    pub vector_scan_limit: usize,
}

/// Autocomplete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    pub default_limit: usize,
    pub min_query_chars: usize,
}

/// Embedding backfill configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub item_delay_ms: u64,
    pub interval_secs: u64,
}

impl BackfillConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// External classification service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key_env: String,
    pub queue_capacity: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_hybrid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_enabled: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FeedlensError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FeedlensError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| FeedlensError::Io {
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
        let overrides = self.profiles.get(profile).cloned().ok_or_else(|| {
            FeedlensError::InvalidConfigValue {
                path: "profiles".to_string(),
                message: format!("Unknown profile '{}'", profile),
            }
        })?;

        if let Some(mode) = overrides.embedding_mode {
            self.embedding.mode = mode;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(use_hybrid) = overrides.use_hybrid {
            self.search.use_hybrid = use_hybrid;
        }
        if let Some(enabled) = overrides.classification_enabled {
            self.classification.enabled = enabled;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: FEEDLENS_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("FEEDLENS_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            "EMBEDDING__MODE" => self.embedding.mode = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__ENDPOINT" => self.embedding.endpoint = value.to_string(),
            "SEARCH__USE_HYBRID" => self.search.use_hybrid = parse_env(path, value)?,
            "SEARCH__TEXT_WEIGHT" => self.search.text_weight = parse_env(path, value)?,
            "SEARCH__VECTOR_WEIGHT" => self.search.vector_weight = parse_env(path, value)?,
            "BACKFILL__BATCH_SIZE" => self.backfill.batch_size = parse_env(path, value)?,
            "CLASSIFICATION__ENABLED" => self.classification.enabled = parse_env(path, value)?,
            "CLASSIFICATION__ENDPOINT" => self.classification.endpoint = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            FeedlensError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("feedlens").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| FeedlensError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| FeedlensError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| FeedlensError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.feedlens"),
            },
            embedding: EmbeddingConfig {
                mode: "offline".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                endpoint: String::new(),
                api_key_env: "FEEDLENS_EMBEDDING_API_KEY".to_string(),
                dimension: 0,
                max_input_chars: 512,
                request_timeout_ms: 10_000,
                max_attempts: 3,
                initial_backoff_ms: 200,
                max_backoff_ms: 5_000,
            },
            search: SearchConfig {
                default_limit: 10,
                max_limit: 100,
                default_threshold: 0.5,
                use_hybrid: true,
                text_weight: 0.3,
                vector_weight: 0.7,
                vector_scan_limit: 1000,
            },
            suggestions: SuggestionConfig {
                default_limit: 5,
                min_query_chars: 2,
            },
            backfill: BackfillConfig {
                batch_size: 50,
                item_delay_ms: 100,
                interval_secs: 60,
            },
            classification: ClassificationConfig {
                enabled: false,
                endpoint: String::new(),
                api_key_env: "FEEDLENS_CLASSIFIER_API_KEY".to_string(),
                queue_capacity: 256,
            },
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.search.text_weight = 0.4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.search.text_weight, 0.4);
        assert_eq!(loaded.embedding.max_input_chars, 512);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/feedlens.toml"));
        assert!(matches!(result, Err(FeedlensError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "degraded".to_string(),
            ProfileOverrides {
                use_hybrid: Some(false),
                embedding_mode: Some("online".to_string()),
                ..Default::default()
            },
        );

        config.apply_profile("degraded").unwrap();
        assert!(!config.search.use_hybrid);
        assert_eq!(config.embedding.mode, "online");

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        let path = PathBuf::from("/var/lib/feedlens");
        assert_eq!(expand_tilde(&path).unwrap(), path);
    }
}
