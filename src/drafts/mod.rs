use crate::error::EngineError;
use crate::models::Reflections;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePool};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

/// A resumable snapshot of an in-progress self-rating. Advisory only: drafts
/// are cleared unconditionally on successful submit and the state machine
/// never reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewDraft {
    #[serde(default)]
    pub ratings: BTreeMap<i64, f64>,
    #[serde(default)]
    pub comments: BTreeMap<i64, String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub review_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reflections: Reflections,
}

/// Scoped key-value persistence for drafts, keyed per KPI. `load` returns
/// `None` both on absence and on a payload that no longer deserializes; a
/// stale draft is never an error.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, kpi_id: i64, draft: &ReviewDraft) -> Result<(), EngineError>;
    async fn load(&self, kpi_id: i64) -> Option<ReviewDraft>;
    async fn clear(&self, kpi_id: i64) -> Result<(), EngineError>;
}

fn decode_draft(kpi_id: i64, payload: &str) -> Option<ReviewDraft> {
    match serde_json::from_str(payload) {
        Ok(draft) => Some(draft),
        Err(err) => {
            tracing::warn!("discarding stale draft for kpi {kpi_id}: {err}");
            None
        }
    }
}

/// In-memory draft store, used in tests and as a fallback when no durable
/// storage is configured.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<i64, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, kpi_id: i64, draft: &ReviewDraft) -> Result<(), EngineError> {
        let payload = serde_json::to_string(draft).expect("draft serialization cannot fail");
        self.entries
            .lock()
            .expect("draft store lock poisoned")
            .insert(kpi_id, payload);
        Ok(())
    }

    async fn load(&self, kpi_id: i64) -> Option<ReviewDraft> {
        let payload = self
            .entries
            .lock()
            .expect("draft store lock poisoned")
            .get(&kpi_id)
            .cloned()?;
        decode_draft(kpi_id, &payload)
    }

    async fn clear(&self, kpi_id: i64) -> Result<(), EngineError> {
        self.entries
            .lock()
            .expect("draft store lock poisoned")
            .remove(&kpi_id);
        Ok(())
    }
}

/// SQLite-backed draft store for desktop deployments.
pub struct SqliteDraftStore {
    pool: SqlitePool,
}

impl SqliteDraftStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, sqlx::Error> {
        let db_url = format!("sqlite:{}", db_path.display());

        // Create database if it doesn't exist
        if !sqlx::Sqlite::database_exists(&db_url)
            .await
            .unwrap_or(false)
        {
            sqlx::Sqlite::create_database(&db_url).await?;
        }

        let pool = SqlitePool::connect(&db_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
    async fn save(&self, kpi_id: i64, draft: &ReviewDraft) -> Result<(), EngineError> {
        let payload = serde_json::to_string(draft).expect("draft serialization cannot fail");
        sqlx::query(
            r#"
            INSERT INTO review_drafts (kpi_id, payload, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(kpi_id) DO UPDATE
            SET payload = excluded.payload, updated_at = excluded.updated_at
            "#,
        )
        .bind(kpi_id)
        .bind(&payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, kpi_id: i64) -> Option<ReviewDraft> {
        let payload: Option<String> =
            match sqlx::query_scalar("SELECT payload FROM review_drafts WHERE kpi_id = ?")
                .bind(kpi_id)
                .fetch_optional(&self.pool)
                .await
            {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!("failed to read draft for kpi {kpi_id}: {err}");
                    None
                }
            };
        decode_draft(kpi_id, &payload?)
    }

    async fn clear(&self, kpi_id: i64) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM review_drafts WHERE kpi_id = ?")
            .bind(kpi_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
