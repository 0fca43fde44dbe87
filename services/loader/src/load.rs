//! Load engine: write normalized records into the family's table.
//!
//! Every write is one transaction. The table is created if absent before the
//! first statement; rows go out in chunks sized to stay under the
//! PostgreSQL bind-parameter limit.

use async_trait::async_trait;
use normalizer::{NormalizedRecord, ReportFamily};
use serde::Serialize;
use sqlx::postgres::PgDatabaseError;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMethod {
    /// Plain insert; any identity collision fails the load.
    Insert,
    /// Insert, overwriting every non-key column on identity conflict.
    Upsert,
    /// Truncate the table, then insert.
    Overwrite,
}

impl fmt::Display for LoadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadMethod::Insert => "insert",
            LoadMethod::Upsert => "upsert",
            LoadMethod::Overwrite => "overwrite",
        })
    }
}

impl FromStr for LoadMethod {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insert" => Ok(LoadMethod::Insert),
            "upsert" => Ok(LoadMethod::Upsert),
            "overwrite" | "replace" => Ok(LoadMethod::Overwrite),
            other => Err(LoadError::InvalidMethod(other.to_string())),
        }
    }
}

/// Apply the method's in-batch rules before anything reaches the sink.
///
/// Insert rejects repeated identities. Upsert and overwrite keep the last
/// occurrence of each identity, in the order those last occurrences appear.
pub fn prepare_batch<'a>(
    table: &str,
    records: &'a [NormalizedRecord],
    method: LoadMethod,
) -> Result<Vec<&'a NormalizedRecord>, LoadError> {
    let mut seen = HashSet::with_capacity(records.len());

    if method == LoadMethod::Insert {
        for record in records {
            if !seen.insert(record.identity.as_str()) {
                return Err(LoadError::IdentityCollision {
                    table: table.to_string(),
                    identity: record.identity.clone(),
                });
            }
        }
        return Ok(records.iter().collect());
    }

    let mut kept: Vec<&NormalizedRecord> = records
        .iter()
        .rev()
        .filter(|r| seen.insert(r.identity.as_str()))
        .collect();
    kept.reverse();

    let collapsed = records.len() - kept.len();
    if collapsed > 0 {
        tracing::warn!(table, collapsed, "collapsed duplicate identities in batch");
    }
    Ok(kept)
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write an already-prepared batch; returns the number of rows written.
    async fn write(
        &self,
        family: ReportFamily,
        records: &[&NormalizedRecord],
        method: LoadMethod,
    ) -> Result<usize, LoadError>;
}

pub async fn load_records(
    sink: &dyn RecordSink,
    family: ReportFamily,
    records: &[NormalizedRecord],
    method: LoadMethod,
) -> Result<usize, LoadError> {
    let batch = prepare_batch(family.table_name(), records, method)?;
    let written = sink.write(family, &batch, method).await?;
    tracing::info!(table = family.table_name(), %method, written, "load complete");
    Ok(written)
}

// =============================================================================
// PostgreSQL sink
// =============================================================================

pub const COLUMNS: [&str; 12] = [
    "surrogate_key",
    "family",
    "code",
    "secondary_code",
    "label",
    "metric",
    "amount",
    "full_date",
    "year_quarter",
    "section",
    "source_file",
    "source_row",
];

const BIND_LIMIT: usize = 65_535;

pub const ROWS_PER_STATEMENT: usize = BIND_LIMIT / COLUMNS.len();

pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            surrogate_key TEXT PRIMARY KEY,
            family TEXT NOT NULL,
            code TEXT,
            secondary_code TEXT,
            label TEXT NOT NULL,
            metric TEXT NOT NULL,
            amount DOUBLE PRECISION,
            full_date TEXT,
            year_quarter TEXT NOT NULL,
            section TEXT NOT NULL,
            source_file TEXT NOT NULL,
            source_row INTEGER NOT NULL,
            loaded_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    )
}

pub fn upsert_clause() -> String {
    let updates: Vec<String> = COLUMNS[1..]
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .chain(std::iter::once("loaded_at = now()".to_string()))
        .collect();
    format!(" ON CONFLICT (surrogate_key) DO UPDATE SET {}", updates.join(", "))
}

/// Identity named in a PostgreSQL unique-violation detail such as
/// `Key (surrogate_key)=(abc) already exists.`
pub fn collision_identity(detail: &str) -> Option<&str> {
    let start = detail.find(")=(")? + 3;
    let end = detail.rfind(") already exists")?;
    (end >= start).then(|| &detail[start..end])
}

/// Maps a unique violation to `IdentityCollision`; other errors pass through.
fn classify_insert_error(table: &str, err: sqlx::Error) -> LoadError {
    let collision = err.as_database_error().and_then(|db| {
        if db.code().as_deref() != Some("23505") {
            return None;
        }
        let detail = db
            .try_downcast_ref::<PgDatabaseError>()
            .and_then(|pg| pg.detail())
            .map(|d| collision_identity(d).unwrap_or(d).to_string());
        Some(detail.unwrap_or_else(|| db.message().to_string()))
    });
    match collision {
        Some(identity) => LoadError::IdentityCollision {
            table: table.to_string(),
            identity,
        },
        None => LoadError::Database(err),
    }
}

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSink for PgSink {
    async fn write(
        &self,
        family: ReportFamily,
        records: &[&NormalizedRecord],
        method: LoadMethod,
    ) -> Result<usize, LoadError> {
        let table = family.table_name();
        let mut tx = self.pool.begin().await?;

        sqlx::query(&create_table_sql(table)).execute(&mut *tx).await?;

        if method == LoadMethod::Overwrite {
            sqlx::query(&format!("TRUNCATE TABLE {table}"))
                .execute(&mut *tx)
                .await?;
        }

        let mut written = 0;
        for chunk in records.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, COLUMNS.join(", ")));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.identity.clone())
                    .push_bind(r.family.slug())
                    .push_bind(r.code.clone())
                    .push_bind(r.secondary_code.clone())
                    .push_bind(r.label.clone())
                    .push_bind(r.metric.clone())
                    .push_bind(r.amount)
                    .push_bind(r.full_date.clone())
                    .push_bind(r.year_quarter.clone())
                    .push_bind(r.section.clone())
                    .push_bind(r.source_file.clone())
                    .push_bind(r.source_row as i32);
            });
            if method == LoadMethod::Upsert {
                qb.push(upsert_clause());
            }

            let result = qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| classify_insert_error(table, e))?;
            written += result.rows_affected() as usize;
            tracing::debug!(table, chunk = chunk.len(), "wrote chunk");
        }

        tx.commit().await?;
        Ok(written)
    }
}
