//! Turns a fetched value grid into [`NormalizedRow`]s keyed by
//! `(department, report_date)`.

use std::collections::BTreeSet;

use olapsync_core::coerce::{decimal_or_zero, parse_day, scalar_text};
use olapsync_core::{ConflictKey, DateRange, Location, NormalizedRow};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::layout::{normalize_header, SheetKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetStats {
    /// Data rows seen (header excluded).
    pub input: usize,
    pub kept: usize,
    pub dropped_missing_day: usize,
    pub dropped_out_of_range: usize,
    pub dropped_missing_location: usize,
    pub unknown_locations: BTreeSet<String>,
}

impl SheetStats {
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped_missing_day + self.dropped_out_of_range + self.dropped_missing_location
    }
}

#[derive(Debug, Clone, Default)]
pub struct SheetRows {
    pub rows: Vec<NormalizedRow>,
    pub stats: SheetStats,
}

/// Normalizes the grid of a `kind` sheet, keeping only days inside `range`.
///
/// The first row is the header. A sheet without a recognizable date column
/// yields no rows. Cells past the end of a ragged row read as empty.
#[must_use]
pub fn normalize_sheet(kind: SheetKind, grid: &[Vec<Value>], range: DateRange) -> SheetRows {
    let mut out = SheetRows::default();
    let Some((header_row, data)) = grid.split_first() else {
        return out;
    };
    out.stats.input = data.len();

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| normalize_header(&scalar_text(cell).unwrap_or_default()))
        .collect();
    let columns = kind.resolve(&headers);

    let Some(date_col) = columns.date else {
        tracing::warn!(%kind, ?headers, "no date column found in sheet");
        return out;
    };
    if columns.department.is_none() {
        tracing::warn!(%kind, "no department column found in sheet");
    }

    let empty = Value::Null;
    for cells in data {
        let cell = |idx: usize| cells.get(idx).unwrap_or(&empty);

        let Some(day) = scalar_text(cell(date_col)).and_then(|raw| parse_day(&raw)) else {
            out.stats.dropped_missing_day += 1;
            continue;
        };
        if !range.contains(day) {
            out.stats.dropped_out_of_range += 1;
            continue;
        }

        let location = columns
            .department
            .and_then(|idx| scalar_text(cell(idx)))
            .and_then(|raw| Location::canonicalize(&raw));
        let Some(location) = location else {
            out.stats.dropped_missing_location += 1;
            continue;
        };
        if let Location::Unknown(name) = &location {
            if out.stats.unknown_locations.insert(name.clone()) {
                tracing::warn!(%kind, location = %name, "unknown location passed through");
            }
        }

        let raw: Map<String, Value> = header_row
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| scalar_text(header).map(|h| (h, cell(idx).clone())))
            .collect();
        let mut row =
            NormalizedRow::new(ConflictKey::daily(location, day)).with_raw(Value::Object(raw));
        for field in kind.measures() {
            let value = columns
                .measures
                .iter()
                .find(|(f, _)| *f == field)
                .map_or(Decimal::ZERO, |(_, idx)| decimal_or_zero(cell(*idx)));
            row = row.with_value(field, value);
        }
        out.rows.push(row);
    }

    out.stats.kept = out.rows.len();
    tracing::debug!(
        %kind,
        input = out.stats.input,
        kept = out.stats.kept,
        dropped = out.stats.dropped(),
        "sheet normalized"
    );
    out
}
