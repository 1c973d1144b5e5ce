//! SQLite-backed feedback store

use super::{FailureKind, FeedbackRecord, FeedbackStore, FeedbackWindow};
use crate::agents::AgentKind;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// SQLite-backed append-only feedback store.
///
/// Invocation outcomes land in `feedback`; satisfaction marks land in a
/// separate `satisfaction` table and are joined at read time, so a late
/// `satisfactory = false` flips the effective outcome without touching the
/// original row.
pub struct SqliteFeedbackStore {
    pool: SqlitePool,
}

impl SqliteFeedbackStore {
    /// Open (or create) a store at the given path
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory store, used by tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Storage(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                success INTEGER NOT NULL,
                latency_ms INTEGER NOT NULL,
                confidence REAL NOT NULL,
                fields_present TEXT NOT NULL,
                error_kind TEXT,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_agent_time
                ON feedback(agent, recorded_at);

            CREATE TABLE IF NOT EXISTS satisfaction (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                satisfactory INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_satisfaction_request
                ON satisfaction(request_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    async fn insert_record(&self, record: &FeedbackRecord) -> Result<()> {
        let fields = serde_json::to_string(&record.fields_present)
            .map_err(|e| Error::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO feedback
                (request_id, agent, success, latency_ms, confidence,
                 fields_present, error_kind, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.request_id.to_string())
        .bind(record.agent.as_str())
        .bind(record.success as i64)
        .bind(record.latency_ms as i64)
        .bind(record.confidence)
        .bind(fields)
        .bind(record.error.map(|k| k.as_str()))
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    async fn insert_satisfaction(&self, request_id: Uuid, satisfactory: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO satisfaction (request_id, satisfactory, recorded_at) VALUES (?, ?, ?)",
        )
        .bind(request_id.to_string())
        .bind(satisfactory as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    fn cutoff_string(window: &FeedbackWindow) -> String {
        let cutoff: DateTime<Utc> = window.cutoff();
        cutoff.to_rfc3339()
    }
}

#[async_trait::async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn record(&self, record: FeedbackRecord) {
        if let Err(e) = self.insert_record(&record).await {
            warn!(agent = %record.agent, error = %e, "failed to persist feedback record");
        }
    }

    async fn record_satisfaction(&self, request_id: Uuid, satisfactory: bool) {
        if let Err(e) = self.insert_satisfaction(request_id, satisfactory).await {
            warn!(%request_id, error = %e, "failed to persist satisfaction mark");
        }
    }

    async fn success_rate(&self, agent: AgentKind, window: &FeedbackWindow) -> Option<f64> {
        let rows = sqlx::query(
            r#"
            SELECT f.success,
                   (SELECT s.satisfactory FROM satisfaction s
                     WHERE s.request_id = f.request_id
                     ORDER BY s.id DESC LIMIT 1) AS satisfactory
            FROM feedback f
            WHERE f.agent = ? AND f.recorded_at >= ?
            ORDER BY f.recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(agent.as_str())
        .bind(Self::cutoff_string(window))
        .bind(window.max_records as i64)
        .fetch_all(&self.pool)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                warn!(agent = %agent, error = %e, "success rate query failed");
                return None;
            }
        };

        if rows.is_empty() {
            return None;
        }

        let successes = rows
            .iter()
            .filter(|row| {
                let success: i64 = row.get("success");
                let satisfactory: Option<i64> = row.get("satisfactory");
                success != 0 && satisfactory != Some(0)
            })
            .count();

        Some(successes as f64 / rows.len() as f64)
    }

    async fn recent_errors(&self, agent: AgentKind, window: &FeedbackWindow) -> Vec<FailureKind> {
        let rows = sqlx::query(
            r#"
            SELECT error_kind FROM feedback
            WHERE agent = ? AND error_kind IS NOT NULL AND recorded_at >= ?
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(agent.as_str())
        .bind(Self::cutoff_string(window))
        .bind(window.max_records as i64)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| {
                    let kind: String = row.get("error_kind");
                    FailureKind::parse(&kind)
                })
                .collect(),
            Err(e) => {
                warn!(agent = %agent, error = %e, "recent errors query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteFeedbackStore {
        SqliteFeedbackStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_record_and_rate() {
        let store = store().await;
        let window = FeedbackWindow::default();

        assert_eq!(store.success_rate(AgentKind::Sql, &window).await, None);

        store
            .record(FeedbackRecord::success(
                Uuid::new_v4(),
                AgentKind::Sql,
                150,
                0.9,
                vec!["sql_query".into()],
            ))
            .await;
        store
            .record(FeedbackRecord::failure(
                Uuid::new_v4(),
                AgentKind::Sql,
                90,
                FailureKind::Upstream,
            ))
            .await;

        let rate = store.success_rate(AgentKind::Sql, &window).await.unwrap();
        assert!((rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_satisfaction_mark_flips_outcome() {
        let store = store().await;
        let window = FeedbackWindow::default();
        let request_id = Uuid::new_v4();

        store
            .record(FeedbackRecord::success(
                request_id,
                AgentKind::Unified,
                200,
                0.85,
                vec!["chart_config".into(), "insights".into()],
            ))
            .await;

        let rate = store
            .success_rate(AgentKind::Unified, &window)
            .await
            .unwrap();
        assert!((rate - 1.0).abs() < 1e-9);

        store.record_satisfaction(request_id, false).await;

        let rate = store
            .success_rate(AgentKind::Unified, &window)
            .await
            .unwrap();
        assert!((rate - 0.0).abs() < 1e-9);

        // A later positive mark wins over the earlier negative one.
        store.record_satisfaction(request_id, true).await;
        let rate = store
            .success_rate(AgentKind::Unified, &window)
            .await
            .unwrap();
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recent_errors() {
        let store = store().await;
        store
            .record(FeedbackRecord::failure(
                Uuid::new_v4(),
                AgentKind::Chart,
                50,
                FailureKind::InvalidJson,
            ))
            .await;
        store
            .record(FeedbackRecord::success(
                Uuid::new_v4(),
                AgentKind::Chart,
                60,
                0.9,
                vec!["chart_config".into()],
            ))
            .await;

        let errors = store
            .recent_errors(AgentKind::Chart, &FeedbackWindow::default())
            .await;
        assert_eq!(errors, vec![FailureKind::InvalidJson]);
    }
}
