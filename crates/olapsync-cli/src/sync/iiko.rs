use std::collections::BTreeMap;

use olapsync_core::{AppConfig, DateRange};
use olapsync_db::{DbError, Writer, DISCOUNT_TYPES_IIKO, LOAD_HOURLY_IIKO, MARGIN_IIKO};
use olapsync_iiko::{
    build_for_range, normalize, retry_with_backoff, IikoClient, IikoError, ReportKind, Session,
    DEPARTMENT_DIMENSION,
};

use super::{Family, FamilyRun, KindOutcome, Sink};

/// The merge target and column group each report kind writes.
pub(super) fn writer_for(kind: ReportKind) -> Result<Writer, DbError> {
    let (target, group) = match kind {
        ReportKind::MarginAll => (&MARGIN_IIKO, "all"),
        ReportKind::MarginCourier => (&MARGIN_IIKO, "courier"),
        ReportKind::MarginPickup => (&MARGIN_IIKO, "pickup"),
        ReportKind::LoadHourly => (&LOAD_HOURLY_IIKO, "all"),
        ReportKind::DiscountTypes => (&DISCOUNT_TYPES_IIKO, "all"),
    };
    target.writer(group)
}

/// Syncs every report kind in [`ReportKind::SEQUENCE`] under one session.
///
/// Missing credentials or a failed login fail every kind of the family; the
/// session, once acquired, is released whatever the kinds do.
pub(super) async fn sync_iiko(
    config: &AppConfig,
    sink: Sink<'_>,
    range: DateRange,
) -> Vec<KindOutcome> {
    let kinds = ReportKind::SEQUENCE.map(ReportKind::as_str);

    let Some(credentials) = &config.iiko else {
        tracing::error!("iiko credentials are not configured");
        return FamilyRun::fail_all(
            Family::Iiko,
            &kinds,
            "iiko credentials are not configured (IIKO_BASE_URL, IIKO_LOGIN, IIKO_PASSWORD_SHA1)",
        );
    };
    let client = match IikoClient::new(
        credentials,
        config.iiko_auth_timeout_secs,
        config.iiko_report_timeout_secs,
    ) {
        Ok(client) => client,
        Err(e) => return FamilyRun::fail_all(Family::Iiko, &kinds, &e.to_string()),
    };

    let departments = BTreeMap::from([(
        DEPARTMENT_DIMENSION.to_string(),
        config.departments.clone(),
    )]);

    let result = client
        .with_session(async |session: &Session| {
            let mut family = FamilyRun::new(Family::Iiko, config.on_kind_failure);
            for kind in ReportKind::SEQUENCE {
                if !family.should_run(kind.as_str()) {
                    continue;
                }
                let job = KindJob {
                    client: &client,
                    session,
                    config,
                    range,
                    departments: &departments,
                };
                family.record(kind.as_str(), job.run(kind, sink).await);
            }
            Ok::<_, IikoError>(family.finish())
        })
        .await;

    match result {
        Ok(outcomes) => outcomes,
        Err(e) => {
            tracing::error!(error = %e, "iiko login failed; no report fetched");
            FamilyRun::fail_all(Family::Iiko, &kinds, &e.to_string())
        }
    }
}

struct KindJob<'a> {
    client: &'a IikoClient,
    session: &'a Session,
    config: &'a AppConfig,
    range: DateRange,
    departments: &'a BTreeMap<String, Vec<String>>,
}

impl KindJob<'_> {
    /// Fetch, normalize, merge. Rows reach the sink only after the whole
    /// report has been fetched, so a failed fetch merges nothing.
    async fn run(&self, kind: ReportKind, sink: Sink<'_>) -> anyhow::Result<KindOutcome> {
        let writer = writer_for(kind)?;
        let request = build_for_range(kind, self.range, self.departments);
        let (client, session, request) = (self.client, self.session, &request);

        let records = retry_with_backoff(
            self.config.fetch_max_retries,
            self.config.fetch_retry_backoff_ms,
            || client.fetch(session, request),
        )
        .await?;

        let normalized = normalize(kind, &records);
        let stats = &normalized.stats;

        let merged = sink.write(&writer, &normalized.rows).await?;
        tracing::info!(
            %kind,
            fetched = records.len(),
            kept = stats.kept,
            merged,
            "report kind synced"
        );

        Ok(KindOutcome::succeeded(
            Family::Iiko,
            kind.as_str(),
            normalized.rows.len(),
            merged,
            stats.dropped(),
        ))
    }
}
