//! Persistence for finished reports.
//!
//! Storage is a plain key-value collaborator of the pipeline: the pipeline never
//! touches it, callers persist the [`EssayFeedback`] they got back.

mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::model::EssayFeedback;

pub trait FeedbackStore: Send + Sync {
    fn put(&self, key: &str, feedback: &EssayFeedback) -> anyhow::Result<()>;

    fn get(&self, key: &str) -> anyhow::Result<Option<EssayFeedback>>;

    /// Returns whether a row was removed.
    fn delete(&self, key: &str) -> anyhow::Result<bool>;
}

/// SQLite-backed report store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// In-memory store (tests, one-off runs).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(schema::FEEDBACK_SCHEMA)
            .context("failed to initialise feedback schema")?;
        Ok(())
    }

    /// Keys of stored reports, newest first.
    pub fn list_keys(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key FROM feedback ORDER BY created_at DESC, key")
            .context("prepare list feedback")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("feedback store connection lock poisoned"))
    }
}

impl FeedbackStore for SqliteStore {
    fn put(&self, key: &str, feedback: &EssayFeedback) -> anyhow::Result<()> {
        let body = serde_json::to_string(feedback).context("failed to serialize feedback")?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feedback (key, created_at, overall_score, body_json) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET created_at = excluded.created_at,
                 overall_score = excluded.overall_score, body_json = excluded.body_json",
            params![
                key,
                feedback.created_at().to_rfc3339(),
                feedback.overall_score(),
                body
            ],
        )
        .with_context(|| format!("failed to store feedback {}", key))?;
        debug!(key, overall_score = feedback.overall_score(), "feedback stored");
        Ok(())
    }

    fn get(&self, key: &str) -> anyhow::Result<Option<EssayFeedback>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM feedback WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to load feedback {}", key))?;

        body.map(|b| {
            serde_json::from_str(&b).with_context(|| format!("stored feedback {} is corrupt", key))
        })
        .transpose()
    }

    fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM feedback WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete feedback {}", key))?;
        Ok(n > 0)
    }
}
