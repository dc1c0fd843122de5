//! Normalization from [`RawRecord`] to [`olapsync_core::NormalizedRow`].
//!
//! Records that cannot be keyed (no location, no parseable day, an hour
//! outside `0..=23`) are dropped and counted; they are never an error. Every
//! declared measure is present on the output row, zero when the record lacks
//! it.

use std::collections::BTreeSet;

use olapsync_core::coerce::{decimal_or_zero, leading_hour, parse_day, scalar_text};
use olapsync_core::{ConflictKey, Location, NormalizedRow};
use rust_decimal::Decimal;

use crate::extract::RawRecord;
use crate::reports::{ReportKind, ReportSpec};

/// Data-quality counters for one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub input: usize,
    pub kept: usize,
    pub dropped_missing_location: usize,
    pub dropped_missing_day: usize,
    pub dropped_invalid_hour: usize,
    /// Location names that matched no known alias. Their rows are kept.
    pub unknown_locations: BTreeSet<String>,
}

impl NormalizeStats {
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped_missing_location + self.dropped_missing_day + self.dropped_invalid_hour
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub rows: Vec<NormalizedRow>,
    pub stats: NormalizeStats,
}

enum Rejected {
    MissingLocation,
    MissingDay,
    InvalidHour(u32),
}

/// Normalizes every record of a `kind` report.
#[must_use]
pub fn normalize(kind: ReportKind, records: &[RawRecord]) -> Normalized {
    let spec = kind.spec();
    let mut out = Normalized::default();
    out.stats.input = records.len();

    for record in records {
        match normalize_record(spec, record) {
            Ok(row) => {
                if let Location::Unknown(name) = &row.key.location {
                    if out.stats.unknown_locations.insert(name.clone()) {
                        tracing::warn!(%kind, location = %name, "unknown location passed through");
                    }
                }
                out.rows.push(row);
            }
            Err(Rejected::MissingLocation) => out.stats.dropped_missing_location += 1,
            Err(Rejected::MissingDay) => out.stats.dropped_missing_day += 1,
            Err(Rejected::InvalidHour(hour)) => {
                tracing::debug!(%kind, hour, "record with out-of-range hour dropped");
                out.stats.dropped_invalid_hour += 1;
            }
        }
    }

    out.stats.kept = out.rows.len();
    if out.stats.dropped() > 0 {
        tracing::warn!(
            %kind,
            input = out.stats.input,
            missing_location = out.stats.dropped_missing_location,
            missing_day = out.stats.dropped_missing_day,
            invalid_hour = out.stats.dropped_invalid_hour,
            "records dropped during normalization"
        );
    }
    out
}

fn normalize_record(spec: &ReportSpec, record: &RawRecord) -> Result<NormalizedRow, Rejected> {
    let location = record
        .first_present(spec.location)
        .and_then(scalar_text)
        .and_then(|raw| Location::canonicalize(&raw))
        .ok_or(Rejected::MissingLocation)?;

    let day = record
        .first_present(spec.day)
        .and_then(scalar_text)
        .and_then(|raw| parse_day(&raw))
        .ok_or(Rejected::MissingDay)?;

    let mut key = ConflictKey::daily(location, day);

    if let Some(aliases) = spec.hour {
        let hour = record.first_present(aliases).map_or(0, leading_hour);
        let hour = u8::try_from(hour)
            .ok()
            .filter(|h| *h <= 23)
            .ok_or(Rejected::InvalidHour(hour))?;
        key = key.with_hour(hour);
    }

    if let Some(aliases) = spec.category {
        let category = record
            .first_present(aliases)
            .and_then(scalar_text)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        key = key.with_category(category);
    }

    let row = NormalizedRow::new(key).with_raw(record.to_value());
    let row = spec.measures.iter().fold(row, |row, m| {
        let value = record
            .first_present(m.aliases)
            .map_or(Decimal::ZERO, decimal_or_zero);
        let value = if m.integral { value.trunc() } else { value };
        row.with_value(m.field, value)
    });
    Ok(row)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
