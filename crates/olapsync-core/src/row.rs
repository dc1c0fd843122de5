//! Canonical row shape produced by every source and consumed by the merge engine.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::location::Location;

/// Half-open calendar range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end <= start` (the range would be empty).
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The default daily window: yesterday up to (excluding) `today`.
    #[must_use]
    pub fn yesterday(today: NaiveDate) -> Self {
        let start = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self { start, end: today }
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    /// The last day inside the range.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.start)
    }

    #[must_use]
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Dimension tuple identifying one target row.
///
/// `hour` and `category` are populated only for targets keyed on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    pub location: Location,
    pub day: NaiveDate,
    pub hour: Option<u8>,
    pub category: Option<String>,
}

impl ConflictKey {
    #[must_use]
    pub fn daily(location: Location, day: NaiveDate) -> Self {
        Self {
            location,
            day,
            hour: None,
            category: None,
        }
    }

    #[must_use]
    pub fn with_hour(mut self, hour: u8) -> Self {
        self.hour = Some(hour);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One normalized record: a conflict key plus named numeric measures.
///
/// Measures a source declares but did not observe are stored as zero, so
/// [`NormalizedRow::value`] is total. `raw` keeps the source record for
/// targets with an audit column.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub key: ConflictKey,
    pub values: BTreeMap<&'static str, Decimal>,
    pub raw: Option<Value>,
}

impl NormalizedRow {
    #[must_use]
    pub fn new(key: ConflictKey) -> Self {
        Self {
            key,
            values: BTreeMap::new(),
            raw: None,
        }
    }

    #[must_use]
    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    #[must_use]
    pub fn with_value(mut self, field: &'static str, value: Decimal) -> Self {
        self.values.insert(field, value);
        self
    }

    /// Value of `field`, or zero when the source did not provide it.
    #[must_use]
    pub fn value(&self, field: &str) -> Decimal {
        self.values.get(field).copied().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(DateRange::new(day("2025-06-02"), day("2025-06-02")).is_none());
        assert!(DateRange::new(day("2025-06-03"), day("2025-06-02")).is_none());
    }

    #[test]
    fn range_end_is_exclusive() {
        let range = DateRange::new(day("2025-06-01"), day("2025-06-03")).unwrap();
        assert!(range.contains(day("2025-06-01")));
        assert!(range.contains(day("2025-06-02")));
        assert!(!range.contains(day("2025-06-03")));
        assert_eq!(range.last_day(), day("2025-06-02"));
        assert_eq!(range.num_days(), 2);
    }

    #[test]
    fn yesterday_window_spans_one_day() {
        let range = DateRange::yesterday(day("2025-06-10"));
        assert_eq!(range.start, day("2025-06-09"));
        assert_eq!(range.end, day("2025-06-10"));
    }

    #[test]
    fn missing_value_reads_as_zero() {
        let row = NormalizedRow::new(ConflictKey::daily(Location::Aviagorodok, day("2025-06-01")))
            .with_value("revenue", Decimal::from(10));
        assert_eq!(row.value("revenue"), Decimal::from(10));
        assert_eq!(row.value("discount"), Decimal::ZERO);
    }
}
