//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "feedlens",
    version,
    author = "neur0map",
    about = "Hybrid semantic search over citizen feedback",
    long_about = "Feedlens stores citizen feedback, keeps embeddings for it up to date in the \
                  background, and answers searches by fusing keyword matches with vector \
                  similarity, falling back to keyword search when the embedding service is down."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/feedlens/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a new piece of feedback
    ///
    /// Prints the new item id. When classification is enabled, the command
    /// waits for the classifier to finish (or fail) before exiting; the item
    /// stays pending if the queue rejects it.
    Add {
        /// Feedback text (10-5000 characters)
        text: String,
    },

    /// Search feedback using keyword and semantic matching
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum relevance score (vector-only search)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Disable hybrid fusion and rank by vector similarity only
        #[arg(long)]
        no_hybrid: bool,

        /// Weight of keyword matches in hybrid ranking
        #[arg(long)]
        text_weight: Option<f32>,

        /// Weight of vector similarity in hybrid ranking
        #[arg(long)]
        vector_weight: Option<f32>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Autocomplete a partial query from stored feedback
    Suggest {
        /// Partial query (at least 2 characters)
        partial: String,

        /// Maximum number of suggestions
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show suggestions in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Find feedback similar to an existing item
    Similar {
        /// Feedback item id
        id: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum relevance score
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate embeddings for items that do not have one yet
    Backfill {
        /// Number of items per batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Keep running batches on an interval until Ctrl-C
        #[arg(short, long)]
        watch: bool,

        /// Seconds between batches in watch mode
        #[arg(short, long, value_name = "SECS")]
        interval: Option<u64>,

        /// Show the batch outcome in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show embedding coverage
    Stats {
        /// Show statistics in JSON format
        #[arg(long)]
        json: bool,
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
