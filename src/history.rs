//! SQLite-backed request history.
//!
//! One row per completed invocation. Uses `rusqlite` synchronously; callers
//! on an async runtime hold it behind a mutex and keep calls short.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::telemetry::PerformanceMetrics;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {reason}")]
    Database { reason: String },

    #[error("history serialization error: {reason}")]
    Serialization { reason: String },
}

impl From<rusqlite::Error> for HistoryError {
    fn from(e: rusqlite::Error) -> Self {
        HistoryError::Database {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Serialization {
            reason: e.to_string(),
        }
    }
}

// ─── Types ───────────────────────────────────────────────────────────────────

/// A completed request as shown in the history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub endpoint_name: String,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub metrics: PerformanceMetrics,
    pub stream: bool,
}

impl HistoryEntry {
    /// New entry stamped now, with a fresh id.
    pub fn new(
        endpoint_name: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
        metrics: PerformanceMetrics,
        stream: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            endpoint_name: endpoint_name.into(),
            model: model.into(),
            prompt: prompt.into(),
            response: response.into(),
            metrics,
            stream,
        }
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Open (or create) the history database at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, HistoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), HistoryError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS request_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                endpoint_name TEXT NOT NULL,
                model TEXT NOT NULL,
                prompt TEXT NOT NULL,
                response TEXT NOT NULL,
                metrics TEXT NOT NULL,
                stream INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;
        Ok(())
    }

    pub fn record(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let metrics = serde_json::to_string(&entry.metrics)?;
        self.conn.execute(
            "INSERT INTO request_history
                (id, timestamp, endpoint_name, model, prompt, response, metrics, stream)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.timestamp.to_rfc3339(),
                entry.endpoint_name,
                entry.model,
                entry.prompt,
                entry.response,
                metrics,
                entry.stream,
            ],
        )?;
        tracing::debug!(id = %entry.id, model = %entry.model, "history entry recorded");
        Ok(())
    }

    /// Newest first, at most `limit` entries.
    pub fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, endpoint_name, model, prompt, response, metrics, stream
             FROM request_history ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, bool>(7)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, timestamp, endpoint_name, model, prompt, response, metrics, stream) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| HistoryError::Serialization {
                    reason: format!("bad timestamp '{timestamp}': {e}"),
                })?
                .with_timezone(&Utc);
            entries.push(HistoryEntry {
                id,
                timestamp,
                endpoint_name,
                model,
                prompt,
                response,
                metrics: serde_json::from_str(&metrics)?,
                stream,
            });
        }
        Ok(entries)
    }

    /// Keep only the newest `keep` entries. Returns how many were removed.
    pub fn prune(&self, keep: usize) -> Result<usize, HistoryError> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        let removed = self.conn.execute(
            "DELETE FROM request_history WHERE seq NOT IN (
                SELECT seq FROM request_history ORDER BY seq DESC LIMIT ?1
            )",
            params![keep],
        )?;
        Ok(removed)
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.conn.execute("DELETE FROM request_history", [])?;
        tracing::info!("history cleared");
        Ok(())
    }

    pub fn count(&self) -> Result<usize, HistoryError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM request_history", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
