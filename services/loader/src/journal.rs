//! Run journal: an append-only log of pipeline runs in `pipeline_logs`.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::fmt;

use crate::error::JournalError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunHandle {
    pub pipeline_name: String,
    pub run_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Start,
    Success,
    Fail,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Start => "start",
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait RunJournal: Send + Sync {
    /// Allocate the next run id for `pipeline` and append its `start` row.
    async fn begin(&self, pipeline: &str, config: &serde_json::Value) -> Result<RunHandle, JournalError>;

    /// Append the closing row of a run.
    async fn complete(&self, handle: &RunHandle, status: RunStatus, detail: &str) -> Result<(), JournalError>;
}

pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS pipeline_logs (
        id SERIAL PRIMARY KEY,
        pipeline_name TEXT NOT NULL,
        run_id INTEGER NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
        status TEXT NOT NULL,
        config JSONB,
        logs TEXT
    )
"#;

pub struct PgJournal {
    pool: PgPool,
}

impl PgJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn append(
        &self,
        handle: &RunHandle,
        status: RunStatus,
        config: Option<&serde_json::Value>,
        logs: Option<&str>,
    ) -> Result<(), JournalError> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_logs (pipeline_name, run_id, status, config, logs)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&handle.pipeline_name)
        .bind(handle.run_id)
        .bind(status.as_str())
        .bind(config)
        .bind(logs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RunJournal for PgJournal {
    async fn begin(&self, pipeline: &str, config: &serde_json::Value) -> Result<RunHandle, JournalError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;

        let run_id: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(run_id), 0) + 1 FROM pipeline_logs WHERE pipeline_name = $1",
        )
        .bind(pipeline)
        .fetch_one(&self.pool)
        .await?;

        let handle = RunHandle {
            pipeline_name: pipeline.to_string(),
            run_id,
        };
        self.append(&handle, RunStatus::Start, Some(config), None).await?;
        tracing::info!(pipeline, run_id, "run started");
        Ok(handle)
    }

    async fn complete(&self, handle: &RunHandle, status: RunStatus, detail: &str) -> Result<(), JournalError> {
        self.append(handle, status, None, Some(detail)).await?;
        tracing::info!(pipeline = %handle.pipeline_name, run_id = handle.run_id, %status, "run finished");
        Ok(())
    }
}
