use chrono::Utc;
use feedlens::classify::{ClassificationJob, ClassificationQueue, HttpClassifier};
use feedlens::cli::{Cli, Commands, ConfigAction};
use feedlens::config::{Config, ConfigValidator};
use feedlens::embedding::{
    build_provider, build_provider_or_unavailable, BackfillScheduler, EmbeddingBackfillJob,
    EmbeddingClient,
};
use feedlens::error::{FeedlensError, Result};
use feedlens::retrieval::{
    SearchOrchestrator, SearchRequest, SearchResponse, SuggestionGenerator, SuggestionResponse,
};
use feedlens::storage::{Database, FeedbackStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Accepted feedback length, in characters
const MIN_FEEDBACK_CHARS: usize = 10;
const MAX_FEEDBACK_CHARS: usize = 5000;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Config management works without a database or runtime
    let command = match cli.command {
        Commands::Config { action } => return cmd_config(cli.config, cli.profile, action),
        command => command,
    };

    let config = load_config(cli.config, cli.profile)?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| FeedlensError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    runtime.block_on(run(config, command))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "feedlens=debug" } else { "feedlens=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(config: Config, command: Commands) -> Result<()> {
    let app = App::open(config)?;

    match command {
        Commands::Add { text } => app.cmd_add(&text).await,
        Commands::Search {
            query,
            limit,
            threshold,
            no_hybrid,
            text_weight,
            vector_weight,
            json,
        } => {
            let mut request = SearchRequest::new(query, &app.config.search);
            if let Some(limit) = limit {
                request.limit = limit;
            }
            if let Some(threshold) = threshold {
                request.threshold = threshold;
            }
            if no_hybrid {
                request.use_hybrid = false;
            }
            if let Some(weight) = text_weight {
                request.text_weight = weight;
            }
            if let Some(weight) = vector_weight {
                request.vector_weight = weight;
            }
            app.cmd_search(request, json).await
        }
        Commands::Suggest {
            partial,
            limit,
            json,
        } => app.cmd_suggest(&partial, limit, json),
        Commands::Similar {
            id,
            limit,
            threshold,
            json,
        } => app.cmd_similar(&id, limit, threshold, json).await,
        Commands::Backfill {
            batch_size,
            watch,
            interval,
            json,
        } => app.cmd_backfill(batch_size, watch, interval, json).await,
        Commands::Stats { json } => app.cmd_stats(json),
        Commands::Config { .. } => Ok(()),
    }
}

/// Shared state for one CLI invocation
struct App {
    config: Config,
    store: Arc<Database>,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let db_path = config.storage.database_path()?;
        tracing::debug!("Opening database at {}", db_path.display());
        let store = Arc::new(Database::new(&db_path)?);

        Ok(Self { config, store })
    }

    /// Build the embedding provider; only commands that embed pay for this
    fn embedding_client(&self) -> Result<Arc<EmbeddingClient>> {
        let provider = build_provider(&self.config.embedding).map_err(|e| {
            FeedlensError::Config(format!("Failed to initialize embedding provider: {}", e))
        })?;

        Ok(Arc::new(EmbeddingClient::from_config(
            provider,
            &self.config.embedding,
        )))
    }

    /// Client for search, which degrades to text matching without a provider
    fn search_client(&self) -> Arc<EmbeddingClient> {
        let provider = build_provider_or_unavailable(&self.config.embedding);
        Arc::new(EmbeddingClient::from_config(
            provider,
            &self.config.embedding,
        ))
    }

    async fn cmd_add(&self, text: &str) -> Result<()> {
        let text = text.trim();
        let length = text.chars().count();
        if !(MIN_FEEDBACK_CHARS..=MAX_FEEDBACK_CHARS).contains(&length) {
            return Err(FeedlensError::InvalidInput(format!(
                "Feedback must be between {} and {} characters, got {}",
                MIN_FEEDBACK_CHARS, MAX_FEEDBACK_CHARS, length
            )));
        }

        let item = self.store.insert_feedback(text, Utc::now())?;
        println!("{}", item.id);

        if self.config.classification.enabled {
            let classifier = Arc::new(HttpClassifier::from_config(&self.config.classification));
            let queue = ClassificationQueue::new(
                classifier,
                self.store.clone(),
                self.config.classification.queue_capacity,
            );

            let job = ClassificationJob {
                item_id: item.id.clone(),
                text: item.text.clone(),
            };
            if let Err(e) = queue.submit(job) {
                tracing::warn!("Item {} left pending: {}", item.id, e);
            }

            queue.shutdown().await;
        }

        Ok(())
    }

    async fn cmd_search(&self, request: SearchRequest, json: bool) -> Result<()> {
        request.validate(&self.config.search)?;

        let orchestrator = SearchOrchestrator::new(
            self.search_client(),
            self.store.clone(),
            self.config.search.vector_scan_limit,
        );
        let response = orchestrator.search(&request).await?;

        print_response(&response, json)
    }

    fn cmd_suggest(&self, partial: &str, limit: Option<usize>, json: bool) -> Result<()> {
        let generator =
            SuggestionGenerator::new(self.store.clone(), self.config.suggestions.min_query_chars)?;
        let limit = limit.unwrap_or(self.config.suggestions.default_limit);

        let response = SuggestionResponse {
            suggestions: generator.suggest(partial, limit)?,
        };

        if json {
            return print_json(&response);
        }

        if response.suggestions.is_empty() {
            println!("No suggestions");
        }
        for suggestion in &response.suggestions {
            println!("{}", suggestion);
        }

        Ok(())
    }

    async fn cmd_similar(
        &self,
        id: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
        json: bool,
    ) -> Result<()> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        let threshold = threshold.unwrap_or(self.config.search.default_threshold);

        let mut request = SearchRequest::new(id, &self.config.search);
        request.limit = limit;
        request.threshold = threshold;
        request.validate(&self.config.search)?;

        let orchestrator = SearchOrchestrator::new(
            self.embedding_client()?,
            self.store.clone(),
            self.config.search.vector_scan_limit,
        );
        let response = orchestrator.find_similar(id, limit, threshold).await?;

        print_response(&response, json)
    }

    async fn cmd_backfill(
        &self,
        batch_size: Option<usize>,
        watch: bool,
        interval: Option<u64>,
        json: bool,
    ) -> Result<()> {
        let batch_size = batch_size.unwrap_or(self.config.backfill.batch_size);
        if batch_size == 0 {
            return Err(FeedlensError::InvalidInput(
                "Batch size must be at least 1".to_string(),
            ));
        }

        let job = EmbeddingBackfillJob::new(
            self.embedding_client()?,
            self.store.clone(),
            self.config.backfill.item_delay(),
        );

        if watch {
            let interval = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| self.config.backfill.interval());

            println!(
                "Backfilling every {}s in batches of {} (Ctrl-C to stop)",
                interval.as_secs(),
                batch_size
            );
            let scheduler = BackfillScheduler::spawn(Arc::new(job), batch_size, interval);

            tokio::signal::ctrl_c().await.map_err(|e| FeedlensError::Io {
                source: e,
                context: "Failed to listen for Ctrl-C".to_string(),
            })?;

            scheduler.shutdown().await;
            return Ok(());
        }

        let outcome = job.run_batch(batch_size).await?;

        if json {
            return print_json(&outcome);
        }

        println!(
            "Backfill: {} processed, {} errors (batch size {}, {}ms)",
            outcome.processed, outcome.errors, outcome.batch_size, outcome.duration_ms
        );

        Ok(())
    }

    fn cmd_stats(&self, json: bool) -> Result<()> {
        let coverage = self.store.embedding_coverage()?;

        if json {
            return print_json(&coverage);
        }

        println!("Embedding Coverage");
        println!("==================");
        println!("  With embedding:    {}", coverage.items_with_embedding);
        println!("  Without embedding: {}", coverage.items_without_embedding);
        println!("  Coverage:          {:.2}%", coverage.embedding_coverage_percent);

        Ok(())
    }
}

fn print_response(response: &SearchResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    println!(
        "{} results ({} search, {}ms)",
        response.total_results, response.search_type, response.processing_time_ms
    );

    for (rank, result) in response.results.iter().enumerate() {
        let category = result.category.as_deref().unwrap_or("uncategorized");
        println!(
            "\n{}. [{:.3}] {} ({})",
            rank + 1,
            result.relevance_score,
            result.item_id,
            category
        );
        println!("   {}", result.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!("   {}", result.text);
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| FeedlensError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", json);
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
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
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
                std::fs::create_dir_all(parent).map_err(|e| FeedlensError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            // Save default config
            let config = Config::default();
            config.save(&path)?;

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
            "Config file not found, using defaults. Run 'feedlens config init' to create one."
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
