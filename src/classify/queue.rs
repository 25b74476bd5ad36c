//! Bounded classification queue with a single background worker

use super::{ClassifyError, Classifier};
use crate::storage::{ClassificationOutcome, FeedbackStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Item waiting to be classified
#[derive(Debug, Clone)]
pub struct ClassificationJob {
    pub item_id: String,
    pub text: String,
}

/// Totals reported when the worker drains
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationStats {
    pub classified: u64,
    pub failed: u64,
}

/// Queue feeding a classification worker.
///
/// `submit` never waits: a full queue is reported to the caller and the
/// item stays `pending`.
pub struct ClassificationQueue {
    job_tx: mpsc::Sender<ClassificationJob>,
    worker_handle: JoinHandle<ClassificationStats>,
}

impl ClassificationQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn FeedbackStore>,
        capacity: usize,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel(capacity.max(1));

        let worker_handle = tokio::spawn(classification_worker(job_rx, classifier, store));

        Self {
            job_tx,
            worker_handle,
        }
    }

    pub fn submit(&self, job: ClassificationJob) -> Result<(), ClassifyError> {
        self.job_tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => ClassifyError::QueueFull,
            TrySendError::Closed(_) => ClassifyError::QueueClosed,
        })
    }

    /// Close the queue and wait for pending jobs to be processed
    pub async fn shutdown(self) -> ClassificationStats {
        drop(self.job_tx);

        tracing::info!("Waiting for classification queue to drain...");
        match self.worker_handle.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Classification worker panicked: {}", e);
                ClassificationStats::default()
            }
        }
    }
}

async fn classification_worker(
    mut job_rx: mpsc::Receiver<ClassificationJob>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn FeedbackStore>,
) -> ClassificationStats {
    let mut stats = ClassificationStats::default();

    while let Some(job) = job_rx.recv().await {
        let outcome = match classifier.classify(&job.text).await {
            Ok(classification) => {
                stats.classified += 1;
                tracing::debug!(
                    "Classified {} as {} ({:.2})",
                    job.item_id,
                    classification.category,
                    classification.sentiment
                );
                ClassificationOutcome::Classified {
                    category: classification.category,
                    sentiment: classification.sentiment,
                }
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!("Classification failed for {}: {}", job.item_id, e);
                ClassificationOutcome::Failed
            }
        };

        match store.update_classification(&job.item_id, &outcome) {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Item {} vanished before classification", job.item_id),
            Err(e) => tracing::error!("Failed to record classification for {}: {}", job.item_id, e),
        }
    }

    tracing::info!(
        "Classification worker finished: {} classified, {} failed",
        stats.classified,
        stats.failed
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::storage::{ClassificationStatus, Database};
    use async_trait::async_trait;
    use chrono::Utc;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    /// Labels by keyword; fails on texts containing "gibberish"
    struct KeywordClassifier;

    #[async_trait]
    impl Classifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
            if text.contains("gibberish") {
                return Err(ClassifyError::Format("no label".into()));
            }
            let category = if text.contains("road") { "roads" } else { "other" };
            Ok(Classification {
                category: category.to_string(),
                sentiment: -0.5,
            })
        }
    }

    /// Blocks every call until the test releases permits
    struct GatedClassifier {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Classifier for GatedClassifier {
        async fn classify(&self, _text: &str) -> Result<Classification, ClassifyError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ClassifyError::Transport(e.to_string()))?;
            permit.forget();
            Ok(Classification {
                category: "other".to_string(),
                sentiment: 0.0,
            })
        }
    }

    fn test_db() -> (Arc<Database>, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp.path().join("classify.db")).unwrap());
        (db, temp)
    }

    fn job_for(db: &Database, text: &str) -> ClassificationJob {
        let item = db.insert_feedback(text, Utc::now()).unwrap();
        ClassificationJob {
            item_id: item.id,
            text: item.text,
        }
    }

    #[tokio::test]
    async fn test_worker_records_outcomes() {
        let (db, _temp) = test_db();
        let queue = ClassificationQueue::new(Arc::new(KeywordClassifier), db.clone(), 8);

        let road = job_for(&db, "the road is full of potholes");
        let junk = job_for(&db, "gibberish gibberish gibberish");
        let (road_id, junk_id) = (road.item_id.clone(), junk.item_id.clone());

        queue.submit(road).unwrap();
        queue.submit(junk).unwrap();

        let stats = queue.shutdown().await;
        assert_eq!(stats, ClassificationStats { classified: 1, failed: 1 });

        let road = db.get_feedback(&road_id).unwrap().unwrap();
        assert_eq!(road.classification_status, ClassificationStatus::Done);
        assert_eq!(road.category.as_deref(), Some("roads"));

        let junk = db.get_feedback(&junk_id).unwrap().unwrap();
        assert_eq!(junk.classification_status, ClassificationStatus::Failed);
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        let (db, _temp) = test_db();
        let gate = Arc::new(Semaphore::new(0));
        let queue = ClassificationQueue::new(
            Arc::new(GatedClassifier { gate: gate.clone() }),
            db.clone(),
            1,
        );

        let results: Vec<_> = (0..3)
            .map(|i| queue.submit(job_for(&db, &format!("feedback number {}", i))))
            .collect();
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ClassifyError::QueueFull))));

        gate.add_permits(10);
        let stats = queue.shutdown().await;
        assert_eq!(
            stats.classified as usize,
            results.iter().filter(|r| r.is_ok()).count()
        );
    }
}
