use async_trait::async_trait;
use chrono::Utc;
use feedlens::classify::{
    Classification, ClassificationJob, ClassificationQueue, Classifier, ClassifyError,
};
use feedlens::config::Config;
use feedlens::embedding::Embedding;
use feedlens::storage::{ClassificationStatus, Database, FeedbackStore};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_data_survives_reopen() {
    let temp = TempDir::new().unwrap();

    let mut config = Config::default();
    config.storage.data_dir = temp.path().join("feedlens-data");
    let db_path = config.storage.database_path().unwrap();

    let id = {
        let db = Database::new(&db_path).unwrap();
        let item = db
            .insert_feedback("Streetlights on Pine Avenue are out", Utc::now())
            .unwrap();
        db.update_embedding(&item.id, &Embedding::new(vec![0.25, -0.5, 1.0], "test-model"))
            .unwrap();
        item.id
    };

    assert!(db_path.exists(), "Database file should exist");
    println!("✓ Database created at: {:?}", db_path);

    // Reopening runs migrations again without touching existing rows
    let db = Database::new(&db_path).unwrap();
    let item = db.get_feedback(&id).unwrap().unwrap();
    let embedding = item.embedding.unwrap();

    assert_eq!(embedding.vector(), &[0.25, -0.5, 1.0]);
    assert_eq!(embedding.model(), "test-model");
    assert_eq!(embedding.dimensions(), 3);
    println!("✓ Embedding survived reopen");
}

/// Sorts feedback into a few fixed categories
struct RuleClassifier;

#[async_trait]
impl Classifier for RuleClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let text = text.to_lowercase();
        let (category, sentiment) = if text.contains("thank") {
            ("praise", 0.9)
        } else if text.contains("light") {
            ("lighting", -0.4)
        } else {
            return Err(ClassifyError::Transport("classifier unavailable".into()));
        };
        Ok(Classification {
            category: category.to_string(),
            sentiment,
        })
    }
}

#[tokio::test]
async fn test_classification_updates_items() {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&temp.path().join("feedback.sqlite")).unwrap());

    let queue = ClassificationQueue::new(Arc::new(RuleClassifier), db.clone(), 16);

    let mut ids = Vec::new();
    for text in [
        "Thank you for fixing the crosswalk",
        "Streetlights on Pine Avenue are out",
        "Something nobody can categorize",
    ] {
        let item = db.insert_feedback(text, Utc::now()).unwrap();
        assert_eq!(item.classification_status, ClassificationStatus::Pending);
        queue
            .submit(ClassificationJob {
                item_id: item.id.clone(),
                text: item.text.clone(),
            })
            .unwrap();
        ids.push(item.id);
    }

    let stats = queue.shutdown().await;
    assert_eq!(stats.classified, 2);
    assert_eq!(stats.failed, 1);

    let praise = db.get_feedback(&ids[0]).unwrap().unwrap();
    assert_eq!(praise.category.as_deref(), Some("praise"));
    assert_eq!(praise.classification_status, ClassificationStatus::Done);

    let lighting = db.get_feedback(&ids[1]).unwrap().unwrap();
    assert_eq!(lighting.category.as_deref(), Some("lighting"));
    assert!(lighting.sentiment.unwrap() < 0.0);

    let unknown = db.get_feedback(&ids[2]).unwrap().unwrap();
    assert_eq!(unknown.classification_status, ClassificationStatus::Failed);
    assert!(unknown.category.is_none());
}
