//! Offline unit tests for olapsync-db pool configuration, row types and
//! target declarations. These tests do not require a live database connection.

use olapsync_core::config::MAX_MERGE_BATCH_SIZE;
use olapsync_core::{AppConfig, Environment, KindFailurePolicy};
use olapsync_db::{
    DbError, KindStatus, MergeReport, PoolConfig, RunOutcome, SyncRunRow, ALL_TARGETS,
    MARGIN_IIKO,
};

fn app_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        iiko: None,
        iiko_auth_timeout_secs: 30,
        iiko_report_timeout_secs: 120,
        departments: vec!["Авиагородок".to_string()],
        merge_batch_size: 500,
        fetch_max_retries: 0,
        fetch_retry_backoff_ms: 1000,
        on_kind_failure: KindFailurePolicy::AbortFamily,
        sheets: None,
        schedule_cron: "0 0 6 * * *".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = app_config("postgres://example");

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`SyncRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn sync_run_row_has_expected_fields() {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    let row = SyncRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        trigger_source: "cli".to_string(),
        date_from: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        date_to: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        rows_merged: 0_i32,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.trigger_source, "cli");
    assert_eq!(row.status, "queued");
    assert!(row.date_from < row.date_to);
    assert!(row.started_at.is_none());
}

#[test]
fn status_strings_match_schema_checks() {
    assert_eq!(RunOutcome::Succeeded.as_str(), "succeeded");
    assert_eq!(RunOutcome::Partial.as_str(), "partial");
    assert_eq!(KindStatus::Failed.as_str(), "failed");
    assert_eq!(KindStatus::Skipped.to_string(), "skipped");
}

#[test]
fn merge_reports_accumulate() {
    let mut total = MergeReport::default();
    total += MergeReport {
        inserted: 2,
        updated: 1,
    };
    total += MergeReport {
        inserted: 0,
        updated: 4,
    };
    assert_eq!(total.inserted, 2);
    assert_eq!(total.updated, 5);
    assert_eq!(total.total(), 7);
}

#[test]
fn all_declared_targets_validate() {
    for target in ALL_TARGETS {
        assert!(target.validate().is_ok(), "{} is invalid", target.table);
    }
}

#[test]
fn max_configured_batch_fits_one_statement_for_every_writer() {
    for target in ALL_TARGETS {
        for group in target.groups {
            let writer = target.writer(group.name).unwrap();
            assert_eq!(
                writer.rows_per_statement(MAX_MERGE_BATCH_SIZE),
                MAX_MERGE_BATCH_SIZE,
                "{} ({})",
                target.table,
                group.name
            );
        }
    }
}

#[tokio::test]
async fn connecting_without_a_database_url_is_rejected() {
    let err = olapsync_db::connect_pool_from_config(&app_config(""))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::MissingDatabaseUrl));
}

#[test]
fn margin_has_nine_value_columns_in_three_groups() {
    assert_eq!(MARGIN_IIKO.groups.len(), 3);
    assert_eq!(MARGIN_IIKO.value_columns().count(), 9);
}

#[test]
fn writer_for_unknown_group_names_the_target() {
    let err = MARGIN_IIKO.writer("delivery").unwrap_err();
    assert!(matches!(err, DbError::UnknownGroup { .. }));
    assert!(err.to_string().contains("margin_iiko"));
}
