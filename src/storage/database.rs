//! SQLite database management with migrations
//!
//! Provides structured storage for feedback items and their embeddings

use super::{
    ClassificationOutcome, ClassificationStatus, EmbeddingCoverage, FeedbackItem, FeedbackStore,
};
use crate::embedding::Embedding;
use crate::error::{FeedlensError, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Columns selected for every feedback query, embedding columns last
const ITEM_COLUMNS: &str = "f.id, f.text, f.category, f.sentiment, f.created_at, \
     f.classification_status, e.vector, e.model, e.dimensions, e.generated_at";

/// Same shape as `ITEM_COLUMNS` with the embedding columns left empty
const TEXT_COLUMNS: &str = "f.id, f.text, f.category, f.sentiment, f.created_at, \
     f.classification_status, NULL, NULL, NULL, NULL";

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FeedlensError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        // Every pooled connection gets the same pragmas
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder().max_size(16).build(manager)?;

        let db = Self { pool };

        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    fn query_items(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<FeedbackItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, FeedbackRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(FeedbackRow::into_item).collect()
    }

    /// Like `query_items`, but rows with an undecodable embedding are logged
    /// and dropped instead of failing the query
    fn query_items_lenient(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<FeedbackItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, FeedbackRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_item() {
                Ok(item) => items.push(item),
                Err(FeedlensError::CorruptEmbedding { id, message }) => {
                    tracing::warn!("Skipping item {} with corrupt embedding: {}", id, message);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(items)
    }
}

impl FeedbackStore for Database {
    fn insert_feedback(&self, text: &str, timestamp: DateTime<Utc>) -> Result<FeedbackItem> {
        let id = Uuid::new_v4().to_string();
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO feedback (id, text, created_at, classification_status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &id,
                text,
                timestamp.timestamp_millis(),
                ClassificationStatus::Pending.as_str()
            ],
        )?;

        tracing::debug!("Stored feedback item {}", id);

        Ok(FeedbackItem {
            id,
            text: text.to_string(),
            category: None,
            sentiment: None,
            timestamp: from_millis(timestamp.timestamp_millis()),
            classification_status: ClassificationStatus::Pending,
            embedding: None,
        })
    }

    fn get_feedback(&self, id: &str) -> Result<Option<FeedbackItem>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM feedback f
                     LEFT JOIN embeddings e ON e.feedback_id = f.id
                     WHERE f.id = ?1"
                ),
                params![id],
                FeedbackRow::from_row,
            )
            .optional()?;

        row.map(FeedbackRow::into_item).transpose()
    }

    fn delete_feedback(&self, id: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM feedback WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn items_missing_embedding(&self, limit: usize) -> Result<Vec<FeedbackItem>> {
        self.query_items(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM feedback f
                 LEFT JOIN embeddings e ON e.feedback_id = f.id
                 WHERE e.feedback_id IS NULL
                 ORDER BY f.created_at ASC, f.seq ASC
                 LIMIT ?1"
            ),
            params![limit as i64],
        )
    }

    fn update_embedding(&self, id: &str, embedding: &Embedding) -> Result<bool> {
        let conn = self.get_conn()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM feedback WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO embeddings (feedback_id, vector, model, dimensions, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(feedback_id) DO UPDATE SET
                vector = excluded.vector,
                model = excluded.model,
                dimensions = excluded.dimensions,
                generated_at = excluded.generated_at",
            params![
                id,
                embedding.to_bytes(),
                embedding.model(),
                embedding.dimensions() as i64,
                embedding.generated_at().timestamp_millis()
            ],
        )?;

        Ok(true)
    }

    fn find_by_text_substring(&self, term: &str, limit: usize) -> Result<Vec<FeedbackItem>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Text matching never needs the vectors
        self.query_items(
            &format!(
                "SELECT {TEXT_COLUMNS} FROM feedback f
                 WHERE instr(lower(f.text), ?1) > 0
                 ORDER BY f.created_at DESC, f.seq DESC
                 LIMIT ?2"
            ),
            params![term, limit as i64],
        )
    }

    fn scan_items_with_embedding(&self, limit: usize) -> Result<Vec<FeedbackItem>> {
        self.query_items_lenient(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM feedback f
                 INNER JOIN embeddings e ON e.feedback_id = f.id
                 ORDER BY f.created_at DESC, f.seq DESC
                 LIMIT ?1"
            ),
            params![limit as i64],
        )
    }

    fn update_classification(&self, id: &str, outcome: &ClassificationOutcome) -> Result<bool> {
        let conn = self.get_conn()?;
        let updated = match outcome {
            ClassificationOutcome::Classified {
                category,
                sentiment,
            } => conn.execute(
                "UPDATE feedback SET category = ?2, sentiment = ?3, classification_status = ?4
                 WHERE id = ?1",
                params![
                    id,
                    category,
                    *sentiment as f64,
                    ClassificationStatus::Done.as_str()
                ],
            )?,
            ClassificationOutcome::Failed => conn.execute(
                "UPDATE feedback SET classification_status = ?2 WHERE id = ?1",
                params![id, ClassificationStatus::Failed.as_str()],
            )?,
        };

        Ok(updated > 0)
    }

    fn embedding_coverage(&self) -> Result<EmbeddingCoverage> {
        let conn = self.get_conn()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))?;
        let embedded: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        Ok(EmbeddingCoverage::from_counts(
            total as usize,
            embedded as usize,
        ))
    }
}

/// Raw columns of one feedback query row
struct FeedbackRow {
    id: String,
    text: String,
    category: Option<String>,
    sentiment: Option<f64>,
    created_at: i64,
    status: String,
    vector: Option<Vec<u8>>,
    model: Option<String>,
    dimensions: Option<i64>,
    generated_at: Option<i64>,
}

impl FeedbackRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            category: row.get(2)?,
            sentiment: row.get(3)?,
            created_at: row.get(4)?,
            status: row.get(5)?,
            vector: row.get(6)?,
            model: row.get(7)?,
            dimensions: row.get(8)?,
            generated_at: row.get(9)?,
        })
    }

    fn into_item(self) -> Result<FeedbackItem> {
        let embedding = match (self.vector, self.model, self.dimensions, self.generated_at) {
            (Some(bytes), Some(model), Some(dimensions), Some(generated_at)) => {
                let dimensions =
                    usize::try_from(dimensions).map_err(|_| FeedlensError::CorruptEmbedding {
                        id: self.id.clone(),
                        message: format!("Negative dimension count {}", dimensions),
                    })?;
                let embedding =
                    Embedding::from_bytes(&bytes, model, dimensions, from_millis(generated_at))
                        .map_err(|e| FeedlensError::CorruptEmbedding {
                            id: self.id.clone(),
                            message: e.to_string(),
                        })?;
                Some(embedding)
            }
            (None, None, None, None) => None,
            _ => {
                return Err(FeedlensError::CorruptEmbedding {
                    id: self.id,
                    message: "Embedding row is missing columns".to_string(),
                });
            }
        };

        let classification_status =
            ClassificationStatus::parse(&self.status).unwrap_or(ClassificationStatus::Pending);

        Ok(FeedbackItem {
            id: self.id,
            text: self.text,
            category: self.category,
            sentiment: self.sentiment.map(|s| s as f32),
            timestamp: from_millis(self.created_at),
            classification_status,
            embedding,
        })
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Feedback items
    CREATE TABLE feedback (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        text TEXT NOT NULL,
        category TEXT,
        sentiment REAL,
        created_at INTEGER NOT NULL,
        classification_status TEXT NOT NULL DEFAULT 'pending'
    );

    CREATE INDEX idx_feedback_created_at ON feedback(created_at);
    CREATE INDEX idx_feedback_status ON feedback(classification_status);

    -- Embeddings (1:1 with feedback, little-endian f32 blob)
    CREATE TABLE embeddings (
        feedback_id TEXT PRIMARY KEY,
        vector BLOB NOT NULL,
        model TEXT NOT NULL,
        dimensions INTEGER NOT NULL,
        generated_at INTEGER NOT NULL,
        FOREIGN KEY (feedback_id) REFERENCES feedback(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_embeddings_model ON embeddings(model);
    "#,
];
