//! Background backfill of embeddings for items stored without one

use super::EmbeddingClient;
use crate::error::Result;
use crate::storage::{FeedbackItem, FeedbackStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Summary of one backfill batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillOutcome {
    pub processed: usize,
    pub errors: usize,
    pub batch_size: usize,
    pub duration_ms: u64,
}

/// Embeds items that are missing a vector and writes the result back.
///
/// A failing item is counted and skipped; only the initial fetch of
/// candidates can fail the whole batch. Items are processed one at a time
/// with `item_delay` between them to stay under upstream rate limits.
pub struct EmbeddingBackfillJob {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn FeedbackStore>,
    item_delay: Duration,
}

impl EmbeddingBackfillJob {
    pub fn new(
        client: Arc<EmbeddingClient>,
        store: Arc<dyn FeedbackStore>,
        item_delay: Duration,
    ) -> Self {
        Self {
            client,
            store,
            item_delay,
        }
    }

    /// Embed up to `batch_size` of the oldest items lacking an embedding
    pub async fn run_batch(&self, batch_size: usize) -> Result<BackfillOutcome> {
        let start = Instant::now();

        let items = self.store.items_missing_embedding(batch_size)?;
        if items.is_empty() {
            debug!("No items missing embeddings");
            return Ok(BackfillOutcome {
                processed: 0,
                errors: 0,
                batch_size,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        info!("Starting embedding backfill of {} items", items.len());

        let mut processed = 0;
        let mut errors = 0;

        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            match self.process_item(item).await {
                Ok(()) => {
                    processed += 1;
                    debug!("Embedded item {}", item.id);
                }
                Err(reason) => {
                    errors += 1;
                    warn!("Failed to embed item {}: {}", item.id, reason);
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Embedding backfill complete: {} processed, {} errors, {}ms",
            processed, errors, duration_ms
        );

        Ok(BackfillOutcome {
            processed,
            errors,
            batch_size,
            duration_ms,
        })
    }

    async fn process_item(&self, item: &FeedbackItem) -> std::result::Result<(), String> {
        let embedding = self
            .client
            .embed(&item.text)
            .await
            .map_err(|e| e.to_string())?;

        match self.store.update_embedding(&item.id, &embedding) {
            Ok(true) => Ok(()),
            Ok(false) => Err("item no longer exists".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Runs an [`EmbeddingBackfillJob`] periodically until shut down
pub struct BackfillScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackfillScheduler {
    /// Spawn the scheduler; the first batch runs immediately
    pub fn spawn(job: Arc<EmbeddingBackfillJob>, batch_size: usize, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match job.run_batch(batch_size).await {
                            Ok(outcome) if outcome.processed + outcome.errors > 0 => {
                                info!(
                                    "Scheduled backfill: {} processed, {} errors",
                                    outcome.processed, outcome.errors
                                );
                            }
                            Ok(_) => {}
                            Err(e) => error!("Scheduled backfill failed: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Backfill scheduler stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the scheduler to stop and wait for the running batch to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!("Backfill scheduler task panicked: {}", e);
        }
    }
}
