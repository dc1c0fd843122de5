//! Run orchestration for `olapsync sync` and the scheduled job.
//!
//! A run covers one date range. The iiko family (one session, every report
//! kind in order) and the spreadsheet family run side by side; each kind
//! ends up as one [`KindOutcome`]. Run bookkeeping in `sync_runs` is
//! best-effort: a bookkeeping failure is logged and never replaces the
//! outcome of the sync itself.

mod iiko;
mod sheets;

use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use olapsync_core::{AppConfig, DateRange, KindFailurePolicy, NormalizedRow};
use olapsync_db::{DbError, KindStatus, RunOutcome, Writer};
use sqlx::PgPool;

/// Source family a report kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Family {
    Iiko,
    Sheets,
}

impl Family {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Iiko => "iiko",
            Family::Sheets => "sheets",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SyncOptions {
    pub range: DateRange,
    pub only: Option<Family>,
    pub dry_run: bool,
    pub trigger_source: &'static str,
}

/// Turns the optional `--from` / `--to` pair into a half-open range.
///
/// Without either bound the range is yesterday. A single bound covers one
/// day on its side of the bound.
pub(crate) fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> anyhow::Result<DateRange> {
    let range = match (from, to) {
        (None, None) => Some(DateRange::yesterday(today)),
        (Some(from), None) => from.succ_opt().and_then(|end| DateRange::new(from, end)),
        (None, Some(to)) => to.pred_opt().and_then(|start| DateRange::new(start, to)),
        (Some(from), Some(to)) => DateRange::new(from, to),
    };
    range.ok_or_else(|| anyhow::anyhow!("empty date range: --from must be earlier than --to"))
}

/// Where normalized rows end up.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Sink<'a> {
    Database { pool: &'a PgPool, batch_size: usize },
    DryRun,
}

impl Sink<'_> {
    /// Returns the number of rows written.
    async fn write(&self, writer: &Writer, rows: &[NormalizedRow]) -> Result<usize, DbError> {
        match self {
            Sink::Database { pool, batch_size } => {
                let report = olapsync_db::merge(pool, writer, rows, *batch_size).await?;
                Ok(report.total())
            }
            Sink::DryRun => {
                tracing::info!(
                    table = writer.target().table,
                    group = writer.group().name,
                    rows = rows.len(),
                    "dry-run: merge skipped"
                );
                Ok(0)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct KindOutcome {
    pub family: Family,
    pub kind: &'static str,
    pub status: KindStatus,
    pub rows_normalized: usize,
    pub rows_merged: usize,
    pub rows_dropped: usize,
    pub error: Option<String>,
}

impl KindOutcome {
    fn succeeded(
        family: Family,
        kind: &'static str,
        rows_normalized: usize,
        rows_merged: usize,
        rows_dropped: usize,
    ) -> Self {
        Self {
            family,
            kind,
            status: KindStatus::Succeeded,
            rows_normalized,
            rows_merged,
            rows_dropped,
            error: None,
        }
    }

    fn failed(family: Family, kind: &'static str, error: String) -> Self {
        Self {
            family,
            kind,
            status: KindStatus::Failed,
            rows_normalized: 0,
            rows_merged: 0,
            rows_dropped: 0,
            error: Some(error),
        }
    }

    fn skipped(family: Family, kind: &'static str, reason: String) -> Self {
        Self {
            status: KindStatus::Skipped,
            ..Self::failed(family, kind, reason)
        }
    }
}

/// Collects the outcomes of one family and applies the configured
/// [`KindFailurePolicy`].
pub(crate) struct FamilyRun {
    family: Family,
    policy: KindFailurePolicy,
    aborted_by: Option<&'static str>,
    outcomes: Vec<KindOutcome>,
}

impl FamilyRun {
    pub(crate) fn new(family: Family, policy: KindFailurePolicy) -> Self {
        Self {
            family,
            policy,
            aborted_by: None,
            outcomes: Vec::new(),
        }
    }

    /// `false` once an earlier kind aborted the family; `kind` is then
    /// recorded as skipped.
    pub(crate) fn should_run(&mut self, kind: &'static str) -> bool {
        let Some(failed) = self.aborted_by else {
            return true;
        };
        self.outcomes.push(KindOutcome::skipped(
            self.family,
            kind,
            format!("not run: {failed} failed earlier in the {} family", self.family),
        ));
        false
    }

    pub(crate) fn record(&mut self, kind: &'static str, result: anyhow::Result<KindOutcome>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(family = %self.family, kind, error = %message, "report kind failed");
                if self.policy == KindFailurePolicy::AbortFamily {
                    self.aborted_by = Some(kind);
                }
                KindOutcome::failed(self.family, kind, message)
            }
        };
        self.outcomes.push(outcome);
    }

    pub(crate) fn finish(self) -> Vec<KindOutcome> {
        self.outcomes
    }

    pub(crate) fn fail_all(family: Family, kinds: &[&'static str], error: &str) -> Vec<KindOutcome> {
        kinds
            .iter()
            .map(|&kind| KindOutcome::failed(family, kind, error.to_string()))
            .collect()
    }

    pub(crate) fn skip_all(family: Family, kinds: &[&'static str], reason: &str) -> Vec<KindOutcome> {
        kinds
            .iter()
            .map(|&kind| KindOutcome::skipped(family, kind, reason.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SyncSummary {
    pub range: DateRange,
    pub dry_run: bool,
    pub kinds: Vec<KindOutcome>,
}

impl SyncSummary {
    pub(crate) fn rows_merged(&self) -> usize {
        self.kinds.iter().map(|k| k.rows_merged).sum()
    }

    pub(crate) fn failed_count(&self) -> usize {
        self.kinds
            .iter()
            .filter(|k| k.status == KindStatus::Failed)
            .count()
    }

    /// `None` when nothing succeeded and something failed: the run failed.
    pub(crate) fn outcome(&self) -> Option<RunOutcome> {
        let any_succeeded = self.kinds.iter().any(|k| k.status == KindStatus::Succeeded);
        match (self.failed_count() > 0, any_succeeded) {
            (false, _) => Some(RunOutcome::Succeeded),
            (true, true) => Some(RunOutcome::Partial),
            (true, false) => None,
        }
    }

    /// `kind: error` for every failed kind, joined with `; `.
    pub(crate) fn failure_message(&self) -> Option<String> {
        let failures: Vec<String> = self
            .kinds
            .iter()
            .filter(|k| k.status == KindStatus::Failed)
            .map(|k| format!("{}: {}", k.kind, k.error.as_deref().unwrap_or("unknown error")))
            .collect();
        (!failures.is_empty()).then(|| failures.join("; "))
    }

    pub(crate) fn print(&self) {
        println!(
            "sync {} .. {}{}",
            self.range.start,
            self.range.end,
            if self.dry_run { " (dry-run)" } else { "" }
        );
        for k in &self.kinds {
            println!(
                "  {:<7} {:<15} {:<10} normalized={} merged={} dropped={}",
                k.family.as_str(),
                k.kind,
                k.status.as_str(),
                k.rows_normalized,
                k.rows_merged,
                k.rows_dropped
            );
            if let Some(error) = &k.error {
                println!("          {error}");
            }
        }
        println!(
            "{} rows merged, {} kind(s) failed",
            self.rows_merged(),
            self.failed_count()
        );
    }
}

/// Runs every selected family for `options.range`.
///
/// `pool` is `None` for dry runs: rows are fetched and normalized but not
/// merged, and no run is recorded.
pub(crate) async fn run_sync(
    pool: Option<&PgPool>,
    config: &AppConfig,
    options: &SyncOptions,
) -> SyncSummary {
    let sink = match pool.filter(|_| !options.dry_run) {
        Some(pool) => Sink::Database {
            pool,
            batch_size: config.merge_batch_size,
        },
        None => Sink::DryRun,
    };

    let run_id = match sink {
        Sink::Database { pool, .. } => begin_run_best_effort(pool, options).await,
        Sink::DryRun => None,
    };

    tracing::info!(
        from = %options.range.start,
        to = %options.range.end,
        days = options.range.num_days(),
        only = options.only.map(Family::as_str),
        dry_run = options.dry_run,
        "sync started"
    );

    let wants = |family: Family| options.only.is_none_or(|only| only == family);
    let (iiko_outcomes, sheets_outcomes) = tokio::join!(
        async {
            if wants(Family::Iiko) {
                iiko::sync_iiko(config, sink, options.range).await
            } else {
                Vec::new()
            }
        },
        async {
            if wants(Family::Sheets) {
                sheets::sync_sheets(config, sink, options.range).await
            } else {
                Vec::new()
            }
        },
    );

    let summary = SyncSummary {
        range: options.range,
        dry_run: options.dry_run,
        kinds: iiko_outcomes.into_iter().chain(sheets_outcomes).collect(),
    };

    if let (Some(run_id), Sink::Database { pool, .. }) = (run_id, sink) {
        finish_run_best_effort(pool, run_id, &summary).await;
    }

    tracing::info!(
        rows_merged = summary.rows_merged(),
        failed = summary.failed_count(),
        "sync finished"
    );
    summary
}

/// Creates and starts a `sync_runs` row, or returns `None` if that fails.
async fn begin_run_best_effort(pool: &PgPool, options: &SyncOptions) -> Option<i64> {
    let run = match olapsync_db::create_sync_run(pool, options.trigger_source, options.range).await
    {
        Ok(run) => run,
        Err(e) => {
            tracing::error!(error = %e, "failed to record sync run; continuing without it");
            return None;
        }
    };
    if let Err(e) = olapsync_db::start_sync_run(pool, run.id).await {
        tracing::error!(run_id = run.id, error = %e, "failed to mark sync run as running");
        return None;
    }
    Some(run.id)
}

async fn finish_run_best_effort(pool: &PgPool, run_id: i64, summary: &SyncSummary) {
    for k in &summary.kinds {
        if let Err(e) = olapsync_db::record_sync_run_kind(
            pool,
            run_id,
            k.family.as_str(),
            k.kind,
            k.status,
            saturating_i32(k.rows_merged),
            saturating_i32(k.rows_dropped),
            k.error.as_deref(),
        )
        .await
        {
            tracing::error!(run_id, kind = k.kind, error = %e, "failed to record kind outcome");
        }
    }

    let message = summary.failure_message();
    let result = match summary.outcome() {
        Some(outcome) => {
            olapsync_db::complete_sync_run(
                pool,
                run_id,
                outcome,
                saturating_i32(summary.rows_merged()),
                message.as_deref(),
            )
            .await
        }
        None => {
            olapsync_db::fail_sync_run(pool, run_id, message.as_deref().unwrap_or("sync failed"))
                .await
        }
    };
    if let Err(e) = result {
        tracing::error!(run_id, error = %e, "failed to finalize sync run");
    }
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
