//! Live integration tests for olapsync-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/olapsync-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use std::time::Duration;

use chrono::NaiveDate;
use olapsync_core::{ConflictKey, DateRange, Location, NormalizedRow};
use olapsync_db::{
    complete_sync_run, create_sync_run, fail_sync_run, fetch_row, get_sync_run,
    list_sync_run_kinds, list_sync_runs, merge, record_sync_run_kind, start_sync_run, DbError,
    KindStatus, RunOutcome, DISCOUNT_TYPES_IIKO, LOAD_HOURLY_IIKO, MARGIN_IIKO, MAX_BIND_PARAMS,
    SHEETS_DIRECT,
};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

fn dec(units: i64) -> Decimal {
    Decimal::new(units, 0)
}

fn margin_row(location: Location, d: u32, revenue: i64, discount: i64, cost: i64) -> NormalizedRow {
    NormalizedRow::new(ConflictKey::daily(location, day(d)))
        .with_value("revenue", dec(revenue))
        .with_value("discount", dec(discount))
        .with_value("product_cost", dec(cost))
}

async fn count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Section 1: Partial merges
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn first_merge_inserts_owned_columns_and_zeroes_the_rest(pool: sqlx::PgPool) {
    let writer = MARGIN_IIKO.writer("all").unwrap();
    let rows = vec![margin_row(Location::Aviagorodok, 1, 1050, 50, 400)];

    let report = merge(&pool, &writer, &rows, 500).await.expect("merge failed");
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 0);

    let stored = fetch_row(&pool, &MARGIN_IIKO, &rows[0].key)
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(stored.value("revenue"), Some(dec(1050)));
    assert_eq!(stored.value("discount"), Some(dec(50)));
    assert_eq!(stored.value("product_cost"), Some(dec(400)));
    assert_eq!(stored.value("revenue_courier"), Some(Decimal::ZERO));
    assert_eq!(stored.value("product_cost_pickup"), Some(Decimal::ZERO));
}

#[sqlx::test(migrations = "../../migrations")]
async fn courier_merge_leaves_all_and_pickup_columns_untouched(pool: sqlx::PgPool) {
    let all = MARGIN_IIKO.writer("all").unwrap();
    let courier = MARGIN_IIKO.writer("courier").unwrap();

    merge(&pool, &all, &[margin_row(Location::Domodedovo, 1, 1000, 10, 300)], 500)
        .await
        .unwrap();
    let report = merge(&pool, &courier, &[margin_row(Location::Domodedovo, 1, 400, 4, 120)], 500)
        .await
        .unwrap();
    assert_eq!(report.updated, 1);

    let key = ConflictKey::daily(Location::Domodedovo, day(1));
    let stored = fetch_row(&pool, &MARGIN_IIKO, &key).await.unwrap().unwrap();
    assert_eq!(stored.value("revenue"), Some(dec(1000)));
    assert_eq!(stored.value("revenue_courier"), Some(dec(400)));
    assert_eq!(stored.value("discount_courier"), Some(dec(4)));
    assert_eq!(stored.value("product_cost_courier"), Some(dec(120)));
    assert_eq!(stored.value("revenue_pickup"), Some(Decimal::ZERO));
    assert_eq!(count(&pool, "margin_iiko").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn group_order_does_not_change_the_final_row(pool: sqlx::PgPool) {
    let groups = ["all", "courier", "pickup"];
    let values = [(100, 1, 30), (40, 2, 12), (60, 3, 18)];

    for (group, (r, d, c)) in groups.iter().zip(values) {
        let writer = MARGIN_IIKO.writer(group).unwrap();
        merge(&pool, &writer, &[margin_row(Location::Aviagorodok, 1, r, d, c)], 500)
            .await
            .unwrap();
    }
    for (group, (r, d, c)) in groups.iter().zip(values).rev() {
        let writer = MARGIN_IIKO.writer(group).unwrap();
        merge(&pool, &writer, &[margin_row(Location::Domodedovo, 1, r, d, c)], 500)
            .await
            .unwrap();
    }

    let forward = fetch_row(
        &pool,
        &MARGIN_IIKO,
        &ConflictKey::daily(Location::Aviagorodok, day(1)),
    )
    .await
    .unwrap()
    .unwrap();
    let backward = fetch_row(
        &pool,
        &MARGIN_IIKO,
        &ConflictKey::daily(Location::Domodedovo, day(1)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(forward.values, backward.values);
    assert_eq!(forward.value("revenue_pickup"), Some(dec(60)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn repeated_merge_is_idempotent_but_refreshes_updated_at(pool: sqlx::PgPool) {
    let writer = MARGIN_IIKO.writer("all").unwrap();
    let rows = vec![margin_row(Location::Aviagorodok, 2, 500, 5, 200)];

    merge(&pool, &writer, &rows, 500).await.unwrap();
    let first = fetch_row(&pool, &MARGIN_IIKO, &rows[0].key)
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = merge(&pool, &writer, &rows, 500).await.unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 1);

    let second = fetch_row(&pool, &MARGIN_IIKO, &rows[0].key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.values, second.values);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(count(&pool, "margin_iiko").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_keys_in_one_call_keep_the_last_row(pool: sqlx::PgPool) {
    let writer = MARGIN_IIKO.writer("all").unwrap();
    let rows = vec![
        margin_row(Location::Aviagorodok, 3, 1, 1, 1),
        margin_row(Location::Domodedovo, 3, 7, 7, 7),
        margin_row(Location::Aviagorodok, 3, 2, 2, 2),
    ];

    let report = merge(&pool, &writer, &rows, 500).await.unwrap();
    assert_eq!(report.total(), 2);

    let stored = fetch_row(&pool, &MARGIN_IIKO, &rows[0].key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.value("revenue"), Some(dec(2)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn rows_are_split_into_batches(pool: sqlx::PgPool) {
    let writer = LOAD_HOURLY_IIKO.writer("all").unwrap();
    let rows: Vec<NormalizedRow> = (0..24u8)
        .map(|hour| {
            NormalizedRow::new(ConflictKey::daily(Location::Aviagorodok, day(4)).with_hour(hour))
                .with_value("orders_count", dec(i64::from(hour)))
                .with_value("revenue", dec(100))
        })
        .collect();

    let report = merge(&pool, &writer, &rows, 5).await.unwrap();
    assert_eq!(report.inserted, 24);
    assert_eq!(count(&pool, "load_hourly_iiko").await, 24);

    let key = ConflictKey::daily(Location::Aviagorodok, day(4)).with_hour(23);
    let stored = fetch_row(&pool, &LOAD_HOURLY_IIKO, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.value("orders_count"), Some(dec(23)));
    assert_eq!(stored.value("discount"), Some(Decimal::ZERO));
}

#[sqlx::test(migrations = "../../migrations")]
async fn oversized_batch_is_split_below_the_bind_limit(pool: sqlx::PgPool) {
    let writer = MARGIN_IIKO.writer("all").unwrap();
    // 2 key + 3 owned binds per row: one statement cannot hold all of them.
    let total = MAX_BIND_PARAMS / 5 + 1_000;
    let rows: Vec<NormalizedRow> = (0..total)
        .map(|i| margin_row(Location::Unknown(format!("Точка {i}")), 1, 10, 1, 5))
        .collect();

    let report = merge(&pool, &writer, &rows, total).await.unwrap();
    assert_eq!(report.inserted, total);
    assert_eq!(count(&pool, "margin_iiko").await, i64::try_from(total).unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn raw_source_record_is_stored_and_replaced(pool: sqlx::PgPool) {
    let writer = SHEETS_DIRECT.writer("direct").unwrap();
    let key = ConflictKey::daily(Location::Domodedovo, day(2));
    let row = |budget: i64, raw: serde_json::Value| {
        NormalizedRow::new(key.clone())
            .with_value("ad_budget", dec(budget))
            .with_raw(raw)
    };

    merge(&pool, &writer, &[row(100, serde_json::json!({"Бюджет": "100"}))], 500)
        .await
        .unwrap();
    merge(&pool, &writer, &[row(250, serde_json::json!({"Бюджет": "250"}))], 500)
        .await
        .unwrap();

    let stored = fetch_row(&pool, &SHEETS_DIRECT, &key).await.unwrap().unwrap();
    assert_eq!(stored.value("ad_budget"), Some(dec(250)));
    assert_eq!(stored.raw, Some(serde_json::json!({"Бюджет": "250"})));

    let margin_key = ConflictKey::daily(Location::Domodedovo, day(2));
    merge(
        &pool,
        &MARGIN_IIKO.writer("all").unwrap(),
        &[margin_row(Location::Domodedovo, 2, 1, 0, 0).with_raw(serde_json::json!({}))],
        500,
    )
    .await
    .unwrap();
    let margin = fetch_row(&pool, &MARGIN_IIKO, &margin_key).await.unwrap().unwrap();
    assert_eq!(margin.raw, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_batch_rolls_back_the_whole_call(pool: sqlx::PgPool) {
    let writer = LOAD_HOURLY_IIKO.writer("all").unwrap();
    // Hour 24 violates the table's range check in the second batch.
    let rows: Vec<NormalizedRow> = [1u8, 24]
        .into_iter()
        .map(|hour| {
            NormalizedRow::new(ConflictKey::daily(Location::Domodedovo, day(5)).with_hour(hour))
                .with_value("orders_count", dec(1))
        })
        .collect();

    let err = merge(&pool, &writer, &rows, 1)
        .await
        .expect_err("check violation should fail the merge");
    assert!(matches!(
        err,
        DbError::Merge {
            target: "load_hourly_iiko",
            group: "all",
            ..
        }
    ));
    assert_eq!(count(&pool, "load_hourly_iiko").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn category_keyed_rows_are_distinct_per_discount_type(pool: sqlx::PgPool) {
    let writer = DISCOUNT_TYPES_IIKO.writer("all").unwrap();
    let base = ConflictKey::daily(Location::Aviagorodok, day(6));
    let rows = vec![
        NormalizedRow::new(base.clone().with_category("Сотрудники"))
            .with_value("orders_count", dec(3))
            .with_value("average_check", Decimal::new(45050, 2)),
        NormalizedRow::new(base.clone().with_category("")).with_value("orders_count", dec(9)),
    ];

    merge(&pool, &writer, &rows, 500).await.unwrap();
    assert_eq!(count(&pool, "discount_types_iiko").await, 2);

    let stored = fetch_row(&pool, &DISCOUNT_TYPES_IIKO, &rows[0].key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.value("average_check"), Some(Decimal::new(45050, 2)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn missing_key_component_fails_before_writing(pool: sqlx::PgPool) {
    let writer = LOAD_HOURLY_IIKO.writer("all").unwrap();
    let rows = vec![NormalizedRow::new(ConflictKey::daily(Location::Aviagorodok, day(7)))];

    let err = merge(&pool, &writer, &rows, 500).await.unwrap_err();
    assert!(matches!(err, DbError::MissingKeyComponent { .. }));
    assert_eq!(count(&pool, "load_hourly_iiko").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_input_is_a_no_op(pool: sqlx::PgPool) {
    let writer = SHEETS_DIRECT.writer("direct").unwrap();
    let report = merge(&pool, &writer, &[], 500).await.unwrap();
    assert_eq!(report.total(), 0);
    assert_eq!(count(&pool, "sheets_direct").await, 0);
}

// ---------------------------------------------------------------------------
// Section 2: Sync run lifecycle
// ---------------------------------------------------------------------------

fn window() -> DateRange {
    DateRange::new(day(1), day(2)).unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "cli", window())
        .await
        .expect("create_sync_run failed");
    assert_eq!(run.status, "queued");
    assert_eq!(run.date_from, day(1));
    assert_eq!(run.date_to, day(2));
    assert!(run.started_at.is_none());

    start_sync_run(&pool, run.id).await.expect("start failed");
    complete_sync_run(&pool, run.id, RunOutcome::Succeeded, 42, None)
        .await
        .expect("complete failed");

    let fetched = get_sync_run(&pool, run.id).await.expect("get failed");
    assert_eq!(fetched.status, "succeeded");
    assert_eq!(fetched.rows_merged, 42);
    assert!(fetched.started_at.is_some());
    assert!(fetched.completed_at.is_some());
    assert!(fetched.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_partial_keeps_summary(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "schedule", window()).await.unwrap();
    start_sync_run(&pool, run.id).await.unwrap();
    complete_sync_run(
        &pool,
        run.id,
        RunOutcome::Partial,
        10,
        Some("margin-courier: report fetch failed"),
    )
    .await
    .unwrap();

    let fetched = get_sync_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "partial");
    assert_eq!(
        fetched.error_message.as_deref(),
        Some("margin-courier: report fetch failed")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_lifecycle_queued_to_failed(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "cli", window()).await.unwrap();
    start_sync_run(&pool, run.id).await.unwrap();
    fail_sync_run(&pool, run.id, "auth failed").await.unwrap();

    let fetched = get_sync_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "failed");
    assert!(fetched.completed_at.is_some());
    assert_eq!(fetched.error_message.as_deref(), Some("auth failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_cannot_complete_directly_from_queued(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "cli", window()).await.unwrap();

    let err = complete_sync_run(&pool, run.id, RunOutcome::Succeeded, 1, None)
        .await
        .expect_err("completing a queued run should fail");
    assert!(matches!(
        err,
        DbError::InvalidSyncRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_unknown_sync_run_is_not_found(pool: sqlx::PgPool) {
    let err = get_sync_run(&pool, 999_999).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_sync_runs_returns_newest_first(pool: sqlx::PgPool) {
    let first = create_sync_run(&pool, "cli", window()).await.unwrap();
    let second = create_sync_run(&pool, "cli", window()).await.unwrap();

    let runs = list_sync_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second.id);
    assert_eq!(runs[1].id, first.id);

    assert_eq!(list_sync_runs(&pool, 1).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn recording_a_kind_twice_overwrites_it(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "cli", window()).await.unwrap();

    record_sync_run_kind(&pool, run.id, "iiko", "margin-all", KindStatus::Failed, 0, 0, Some("timeout"))
        .await
        .unwrap();
    record_sync_run_kind(&pool, run.id, "iiko", "margin-all", KindStatus::Succeeded, 12, 1, None)
        .await
        .unwrap();
    record_sync_run_kind(&pool, run.id, "sheets", "sheets-fot", KindStatus::Skipped, 0, 0, None)
        .await
        .unwrap();

    let kinds = list_sync_run_kinds(&pool, run.id).await.unwrap();
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0].kind, "margin-all");
    assert_eq!(kinds[0].status, "succeeded");
    assert_eq!(kinds[0].rows_merged, 12);
    assert_eq!(kinds[0].rows_dropped, 1);
    assert!(kinds[0].error_message.is_none());
    assert_eq!(kinds[1].status, "skipped");
}
