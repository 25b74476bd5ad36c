use crate::config::Config;
use crate::error::{FeedlensError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_suggestions(config, &mut errors);
        Self::validate_backfill(config, &mut errors);
        Self::validate_classification(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FeedlensError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
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
        let embedding = &config.embedding;

        let mode = &embedding.mode;
        if mode != "offline" && mode != "online" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", mode),
            ));
        }

        if mode == "online" && embedding.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "embedding.endpoint",
                "Endpoint is required in online mode",
            ));
        }

        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if embedding.max_input_chars == 0 {
            errors.push(ValidationError::new(
                "embedding.max_input_chars",
                "Maximum input length must be greater than 0",
            ));
        }

        if embedding.max_attempts == 0 {
            errors.push(ValidationError::new(
                "embedding.max_attempts",
                "At least one attempt is required",
            ));
        }

        if embedding.request_timeout_ms == 0 {
            errors.push(ValidationError::new(
                "embedding.request_timeout_ms",
                "Request timeout must be greater than 0",
            ));
        }

        if embedding.initial_backoff_ms > embedding.max_backoff_ms {
            errors.push(ValidationError::new(
                "embedding.initial_backoff_ms",
                format!(
                    "Initial backoff ({}ms) exceeds max backoff ({}ms)",
                    embedding.initial_backoff_ms, embedding.max_backoff_ms
                ),
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        if search.max_limit == 0 {
            errors.push(ValidationError::new(
                "search.max_limit",
                "Maximum limit must be greater than 0",
            ));
        }

        if search.default_limit == 0 || search.default_limit > search.max_limit {
            errors.push(ValidationError::new(
                "search.default_limit",
                format!(
                    "Default limit must be between 1 and {}, got {}",
                    search.max_limit, search.default_limit
                ),
            ));
        }

        if !(0.0..=1.0).contains(&search.default_threshold) {
            errors.push(ValidationError::new(
                "search.default_threshold",
                format!(
                    "Threshold must be between 0.0 and 1.0, got {}",
                    search.default_threshold
                ),
            ));
        }

        for (path, weight) in [
            ("search.text_weight", search.text_weight),
            ("search.vector_weight", search.vector_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be a non-negative number, got {}", weight),
                ));
            }
        }

        if search.vector_scan_limit == 0 {
            errors.push(ValidationError::new(
                "search.vector_scan_limit",
                "Vector scan limit must be greater than 0",
            ));
        }
    }

    fn validate_suggestions(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.suggestions.default_limit == 0 {
            errors.push(ValidationError::new(
                "suggestions.default_limit",
                "Default limit must be greater than 0",
            ));
        }

        if config.suggestions.min_query_chars == 0 {
            errors.push(ValidationError::new(
                "suggestions.min_query_chars",
                "Minimum query length must be greater than 0",
            ));
        }
    }

    fn validate_backfill(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.backfill.batch_size == 0 {
            errors.push(ValidationError::new(
                "backfill.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.backfill.interval_secs == 0 {
            errors.push(ValidationError::new(
                "backfill.interval_secs",
                "Interval must be greater than 0",
            ));
        }
    }

    fn validate_classification(config: &Config, errors: &mut Vec<ValidationError>) {
        let classification = &config.classification;

        if classification.enabled && classification.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "classification.endpoint",
                "Endpoint is required when classification is enabled",
            ));
        }

        if classification.queue_capacity == 0 {
            errors.push(ValidationError::new(
                "classification.queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(FeedlensError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_mode() {
        let mut config = Config::default();
        config.embedding.mode = "invalid".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_online_mode_requires_endpoint() {
        let mut config = Config::default();
        config.embedding.mode = "online".to_string();
        assert_eq!(error_paths(&config), vec!["embedding.endpoint"]);

        config.embedding.endpoint = "http://localhost:8080/embed".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_search_bounds() {
        let mut config = Config::default();
        config.search.default_limit = 500;
        config.search.default_threshold = 1.5;
        config.search.vector_weight = -0.1;

        let paths = error_paths(&config);
        assert!(paths.contains(&"search.default_limit".to_string()));
        assert!(paths.contains(&"search.default_threshold".to_string()));
        assert!(paths.contains(&"search.vector_weight".to_string()));
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = Config::default();
        config.backfill.batch_size = 0;
        assert_eq!(error_paths(&config), vec!["backfill.batch_size"]);
    }

    #[test]
    fn test_classification_requires_endpoint() {
        let mut config = Config::default();
        config.classification.enabled = true;
        assert_eq!(error_paths(&config), vec!["classification.endpoint"]);
    }
}
