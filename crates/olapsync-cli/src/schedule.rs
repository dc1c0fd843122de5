//! Daily sync job for `olapsync schedule`.

use std::sync::Arc;

use olapsync_core::{AppConfig, DateRange};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::sync::{self, SyncOptions};

/// Builds and starts the scheduler with the daily sync job registered.
///
/// The returned handle must be kept alive; dropping it stops the job.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub(crate) async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_daily_sync_job(&scheduler, pool, config).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Syncs yesterday on `config.schedule_cron` (default `0 0 6 * * *`).
async fn register_daily_sync_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let cron = config.schedule_cron.clone();
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            let options = SyncOptions {
                range: DateRange::yesterday(chrono::Local::now().date_naive()),
                only: None,
                dry_run: false,
                trigger_source: "schedule",
            };
            tracing::info!("scheduler: starting daily sync");
            let summary = sync::run_sync(Some(&*pool), &config, &options).await;
            tracing::info!(
                rows_merged = summary.rows_merged(),
                failed = summary.failed_count(),
                "scheduler: daily sync complete"
            );
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered daily sync job");
    Ok(())
}
