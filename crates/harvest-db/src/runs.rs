use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::{DatabaseError, Result};

/// One pipeline execution as recorded in the `runs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier
    pub id: String,
    /// Site tag (`smth`, `tc`, `mfw`)
    pub site: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status
    pub status: RunStatus,
    /// Pages in the plan
    pub pages_planned: u32,
    /// Pages whose processing finished
    pub pages_processed: u32,
    /// Records written to the output file
    pub records_exported: u64,
    /// Output file, if one was written
    pub output_path: Option<String>,
    /// Error message if the run failed
    pub error_message: Option<String>,
}

/// Status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    /// Run is still going
    InProgress,
    /// Run finished and exported its result
    Completed,
    /// Run was cancelled; partial results were exported
    Cancelled,
    /// Run failed
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Failed" => Ok(Self::Failed),
            other => Err(DatabaseError::Decode(format!("invalid run status '{other}'"))),
        }
    }
}

/// Record the start of a run.
pub async fn create_run(
    pool: &SqlitePool,
    id: &str,
    site: &str,
    started_at: DateTime<Utc>,
) -> Result<RunRecord> {
    let status = RunStatus::InProgress;

    sqlx::query(
        "INSERT INTO runs (id, site, started_at, status, pages_planned, pages_processed, records_exported)
         VALUES (?, ?, ?, ?, 0, 0, 0)",
    )
    .bind(id)
    .bind(site)
    .bind(started_at.to_rfc3339_opts(SecondsFormat::Micros, true))
    .bind(status.to_string())
    .execute(pool)
    .await?;

    Ok(RunRecord {
        id: id.to_string(),
        site: site.to_string(),
        started_at,
        completed_at: None,
        status,
        pages_planned: 0,
        pages_processed: 0,
        records_exported: 0,
        output_path: None,
        error_message: None,
    })
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Pages in the plan
    pub pages_planned: u32,
    /// Pages whose processing finished
    pub pages_processed: u32,
    /// Records written
    pub records_exported: u64,
    /// Output file, if any
    pub output_path: Option<String>,
}

/// Mark a run as finished (completed or cancelled) with its counters.
pub async fn finish_run(
    pool: &SqlitePool,
    id: &str,
    status: RunStatus,
    outcome: &RunOutcome,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE runs
         SET status = ?, completed_at = ?, pages_planned = ?, pages_processed = ?,
             records_exported = ?, output_path = ?
         WHERE id = ?",
    )
    .bind(status.to_string())
    .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    .bind(i64::from(outcome.pages_planned))
    .bind(i64::from(outcome.pages_processed))
    .bind(i64::try_from(outcome.records_exported).unwrap_or(i64::MAX))
    .bind(outcome.output_path.as_deref())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::RunNotFound { id: id.to_string() });
    }

    Ok(())
}

/// Mark a run as failed.
pub async fn fail_run(
    pool: &SqlitePool,
    id: &str,
    pages_processed: u32,
    error_message: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE runs
         SET status = ?, completed_at = ?, pages_processed = ?, error_message = ?
         WHERE id = ?",
    )
    .bind(RunStatus::Failed.to_string())
    .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    .bind(i64::from(pages_processed))
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::RunNotFound { id: id.to_string() });
    }

    Ok(())
}

type RunRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
    i64,
    Option<String>,
    Option<String>,
);

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decode_row(row: RunRow) -> Result<RunRecord> {
    let (
        id,
        site,
        started_at,
        completed_at,
        status,
        pages_planned,
        pages_processed,
        records_exported,
        output_path,
        error_message,
    ) = row;

    Ok(RunRecord {
        id,
        site,
        started_at: parse_timestamp(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        status: status.parse()?,
        pages_planned: pages_planned.max(0) as u32,
        pages_processed: pages_processed.max(0) as u32,
        records_exported: records_exported.max(0) as u64,
        output_path,
        error_message,
    })
}

/// Most recent runs first, optionally restricted to one site.
pub async fn list_recent(
    pool: &SqlitePool,
    site: Option<&str>,
    limit: u32,
) -> Result<Vec<RunRecord>> {
    let rows: Vec<RunRow> = sqlx::query_as(
        "SELECT id, site, started_at, completed_at, status, pages_planned, pages_processed,
                records_exported, output_path, error_message
         FROM runs
         WHERE (?1 IS NULL OR site = ?1)
         ORDER BY started_at DESC
         LIMIT ?2",
    )
    .bind(site)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_row).collect()
}
