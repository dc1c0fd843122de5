//! Database operations for `sync_runs` and `sync_run_kinds`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use olapsync_core::DateRange;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub date_from: NaiveDate,
    /// Exclusive.
    pub date_to: NaiveDate,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rows_merged: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `sync_run_kinds` table: the outcome of one report kind or
/// sheet within a run.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunKindRow {
    pub id: i64,
    pub sync_run_id: i64,
    pub family: String,
    pub kind: String,
    pub status: String,
    pub rows_merged: i32,
    pub rows_dropped: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Terminal status of a run that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    /// Some kinds failed while others succeeded.
    Partial,
}

impl RunOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl KindStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KindStatus::Succeeded => "succeeded",
            KindStatus::Failed => "failed",
            KindStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for KindStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SYNC_RUN_COLUMNS: &str = "id, public_id, trigger_source, date_from, date_to, status, \
     started_at, completed_at, rows_merged, error_message, created_at";

// ---------------------------------------------------------------------------
// sync_runs operations
// ---------------------------------------------------------------------------

/// Creates a new sync run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(
    pool: &PgPool,
    trigger_source: &str,
    range: DateRange,
) -> Result<SyncRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "INSERT INTO sync_runs (public_id, trigger_source, date_from, date_to, status) \
         VALUES ($1, $2, $3, $4, 'queued') \
         RETURNING {SYNC_RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(trigger_source)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_sync_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Moves a `running` run to `succeeded` or `partial`.
///
/// `error_message` carries a summary of the failed kinds for partial runs.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_sync_run(
    pool: &PgPool,
    id: i64,
    outcome: RunOutcome,
    rows_merged: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = $1, completed_at = NOW(), rows_merged = $2, error_message = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(outcome.as_str())
    .bind(rows_merged)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_sync_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_run(pool: &PgPool, id: i64) -> Result<SyncRunRow, DbError> {
    sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// sync_run_kinds operations
// ---------------------------------------------------------------------------

/// Inserts or updates the per-kind result row for a sync run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
#[allow(clippy::too_many_arguments)]
pub async fn record_sync_run_kind(
    pool: &PgPool,
    run_id: i64,
    family: &str,
    kind: &str,
    status: KindStatus,
    rows_merged: i32,
    rows_dropped: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sync_run_kinds \
             (sync_run_id, family, kind, status, rows_merged, rows_dropped, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (sync_run_id, kind) DO UPDATE SET \
             family        = EXCLUDED.family, \
             status        = EXCLUDED.status, \
             rows_merged   = EXCLUDED.rows_merged, \
             rows_dropped  = EXCLUDED.rows_dropped, \
             error_message = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(family)
    .bind(kind)
    .bind(status.as_str())
    .bind(rows_merged)
    .bind(rows_dropped)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all per-kind rows of a run in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_run_kinds(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<SyncRunKindRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunKindRow>(
        "SELECT id, sync_run_id, family, kind, status, rows_merged, rows_dropped, \
                error_message, created_at \
         FROM sync_run_kinds \
         WHERE sync_run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
