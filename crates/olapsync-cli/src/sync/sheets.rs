use olapsync_core::{AppConfig, DateRange, SheetsConfig};
use olapsync_db::{DbError, Writer, SHEETS_DIRECT, SHEETS_FOT};
use olapsync_sheets::{normalize_sheet, SheetKind, SheetsClient};

use super::{Family, FamilyRun, KindOutcome, Sink};

const SHEETS_TIMEOUT_SECS: u64 = 60;

pub(super) fn writer_for(kind: SheetKind) -> Result<Writer, DbError> {
    match kind {
        SheetKind::Direct => SHEETS_DIRECT.writer("direct"),
        SheetKind::Fot => SHEETS_FOT.writer("fot"),
    }
}

/// Syncs both cost sheets. Without an API key the family is skipped, not failed.
pub(super) async fn sync_sheets(
    config: &AppConfig,
    sink: Sink<'_>,
    range: DateRange,
) -> Vec<KindOutcome> {
    let kinds = SheetKind::ALL.map(SheetKind::as_str);

    let Some(sheets) = &config.sheets else {
        tracing::info!("GOOGLE_SHEETS_API_KEY is not set; skipping spreadsheet sources");
        return FamilyRun::skip_all(Family::Sheets, &kinds, "GOOGLE_SHEETS_API_KEY is not set");
    };
    let client = match SheetsClient::new(sheets, SHEETS_TIMEOUT_SECS) {
        Ok(client) => client,
        Err(e) => return FamilyRun::fail_all(Family::Sheets, &kinds, &e.to_string()),
    };

    let mut family = FamilyRun::new(Family::Sheets, config.on_kind_failure);
    for kind in SheetKind::ALL {
        if !family.should_run(kind.as_str()) {
            continue;
        }
        let result = sync_sheet(&client, sheets, kind, range, sink).await;
        family.record(kind.as_str(), result);
    }
    family.finish()
}

async fn sync_sheet(
    client: &SheetsClient,
    sheets: &SheetsConfig,
    kind: SheetKind,
    range: DateRange,
    sink: Sink<'_>,
) -> anyhow::Result<KindOutcome> {
    let writer = writer_for(kind)?;
    let (sheet, sheet_range) = kind.source(sheets);
    let grid = client.fetch_values(sheet, sheet_range).await?;

    let normalized = normalize_sheet(kind, &grid, range);
    let stats = &normalized.stats;
    let merged = sink.write(&writer, &normalized.rows).await?;
    tracing::info!(
        %kind,
        rows = stats.input,
        kept = stats.kept,
        out_of_range = stats.dropped_out_of_range,
        merged,
        "sheet synced"
    );

    Ok(KindOutcome::succeeded(
        Family::Sheets,
        kind.as_str(),
        normalized.rows.len(),
        merged,
        // Rows outside the run's range are expected and not data-quality drops.
        stats.dropped_missing_day + stats.dropped_missing_location,
    ))
}
