//! Feedlens - Hybrid Search for Citizen Feedback
//!
//! Stores free-form citizen feedback, backfills embeddings for it in the
//! background, and serves hybrid keyword + vector search with a keyword-only
//! fallback when the embedding provider is unavailable.

pub mod classify;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{FeedlensError, Result};
