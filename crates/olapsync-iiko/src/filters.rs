//! Construction of typed, immutable report requests.
//!
//! [`build_request`] is pure: the same inputs always yield an equal
//! [`ReportRequest`], which is what makes a failed kind safe to re-issue.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use olapsync_core::DateRange;
use serde::Serialize;
use serde_json::Value;

use crate::error::IikoError;
use crate::reports::{ReportKind, DATE_DIMENSION};

/// How a report kind expresses the upper bound of its date filter.
///
/// The two forms are not interchangeable upstream; each kind keeps the one it
/// was built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// `to` is the first day *after* the range, sent with `includeHigh: false`.
    ExclusiveNextDay,
    /// `to` is the last instant of the final day, sent with `includeHigh: true`.
    InclusiveEndOfDay,
}

/// One entry of the OLAP `filters` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "filterType")]
pub enum Filter {
    #[serde(rename = "DateRange", rename_all = "camelCase")]
    DateRange {
        period_type: String,
        from: String,
        to: String,
        include_low: bool,
        include_high: bool,
    },
    /// Only the listed values pass.
    #[serde(rename = "IncludeValues")]
    IncludeValues { values: BTreeSet<String> },
}

impl Filter {
    fn date_range(range: DateRange, bound: DateBound) -> Self {
        let (from, to, include_high) = match bound {
            DateBound::ExclusiveNextDay => (
                range.start.format("%Y-%m-%d").to_string(),
                range.end.format("%Y-%m-%d").to_string(),
                false,
            ),
            DateBound::InclusiveEndOfDay => (
                format!("{}T00:00:00.000", range.start.format("%Y-%m-%d")),
                format!("{}T23:59:59.999", range.last_day().format("%Y-%m-%d")),
                true,
            ),
        };
        Filter::DateRange {
            period_type: "CUSTOM".to_string(),
            from,
            to,
            include_low: true,
            include_high,
        }
    }
}

/// A fully specified report request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    kind: ReportKind,
    range: DateRange,
    filters: BTreeMap<String, Filter>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OlapRequestBody<'a> {
    report_type: &'a str,
    group_by_row_fields: &'a [&'a str],
    group_by_col_fields: [&'a str; 0],
    aggregate_fields: &'a [&'a str],
    filters: &'a BTreeMap<String, Filter>,
}

impl ReportRequest {
    #[must_use]
    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    #[must_use]
    pub fn range(&self) -> DateRange {
        self.range
    }

    #[must_use]
    pub fn filters(&self) -> &BTreeMap<String, Filter> {
        &self.filters
    }

    /// The JSON body posted to the OLAP endpoint.
    #[must_use]
    pub fn body(&self) -> Value {
        let spec = self.kind.spec();
        let body = OlapRequestBody {
            report_type: spec.report_type,
            group_by_row_fields: spec.group_by,
            group_by_col_fields: [],
            aggregate_fields: spec.aggregates,
            filters: &self.filters,
        };
        serde_json::to_value(body).unwrap_or(Value::Null)
    }
}

/// Builds the request for `kind` covering `[date_from, date_to)`.
///
/// `date_from` is truncated to the start of its day. `date_to` is an
/// exclusive bound: midnight excludes that day, any later time on a day
/// includes the whole day. `extra` adds include-lists; when a dimension is
/// already constrained by the kind itself, only values allowed by both pass.
///
/// # Errors
///
/// Returns [`IikoError::InvalidRange`] when the normalized range is empty.
pub fn build_request(
    kind: ReportKind,
    date_from: NaiveDateTime,
    date_to: NaiveDateTime,
    extra: &BTreeMap<String, Vec<String>>,
) -> Result<ReportRequest, IikoError> {
    let start = date_from.date();
    let end = exclusive_end(date_to);
    let range = DateRange::new(start, end).ok_or_else(|| IikoError::InvalidRange {
        from: date_from.to_string(),
        to: date_to.to_string(),
    })?;
    Ok(build_for_range(kind, range, extra))
}

/// Builds the request for an already normalized [`DateRange`]. Infallible
/// because a `DateRange` is never empty.
#[must_use]
pub fn build_for_range(
    kind: ReportKind,
    range: DateRange,
    extra: &BTreeMap<String, Vec<String>>,
) -> ReportRequest {
    let spec = kind.spec();
    let mut filters = BTreeMap::new();
    filters.insert(
        DATE_DIMENSION.to_string(),
        Filter::date_range(range, spec.date_bound),
    );

    for (dimension, values) in spec.static_filters {
        filters.insert(
            (*dimension).to_string(),
            Filter::IncludeValues {
                values: values.iter().map(|v| (*v).to_string()).collect(),
            },
        );
    }

    for (dimension, values) in extra {
        let wanted: BTreeSet<String> = values.iter().cloned().collect();
        let merged = match filters.remove(dimension) {
            Some(Filter::IncludeValues { values: existing }) => {
                existing.intersection(&wanted).cloned().collect()
            }
            _ => wanted,
        };
        filters.insert(dimension.clone(), Filter::IncludeValues { values: merged });
    }

    ReportRequest {
        kind,
        range,
        filters,
    }
}

fn exclusive_end(date_to: NaiveDateTime) -> NaiveDate {
    let day = date_to.date();
    if date_to.time() == NaiveTime::MIN {
        day
    } else {
        day.checked_add_days(Days::new(1)).unwrap_or(day)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::reports::DEPARTMENT_DIMENSION;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn departments() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([(
            DEPARTMENT_DIMENSION.to_string(),
            vec!["Авиагородок".to_string(), "Домодедово".to_string()],
        )])
    }

    #[test]
    fn start_is_truncated_and_midnight_end_is_exclusive() {
        let req = build_request(
            ReportKind::MarginAll,
            at("2025-06-01 13:45:00"),
            at("2025-06-02 00:00:00"),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(req.range().start.to_string(), "2025-06-01");
        assert_eq!(req.range().end.to_string(), "2025-06-02");
    }

    #[test]
    fn end_inside_a_day_covers_that_day() {
        let req = build_request(
            ReportKind::MarginAll,
            at("2025-06-01 00:00:00"),
            at("2025-06-01 23:59:59"),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(req.range().end.to_string(), "2025-06-02");
    }

    #[test]
    fn empty_range_is_an_error() {
        let err = build_request(
            ReportKind::MarginAll,
            at("2025-06-02 00:00:00"),
            at("2025-06-02 00:00:00"),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, IikoError::InvalidRange { .. }));
    }

    #[test]
    fn exclusive_kind_sends_next_day_without_high_bound() {
        let req = build_request(
            ReportKind::LoadHourly,
            at("2025-06-01 00:00:00"),
            at("2025-06-02 00:00:00"),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&req.filters()[DATE_DIMENSION]).unwrap(),
            json!({
                "filterType": "DateRange",
                "periodType": "CUSTOM",
                "from": "2025-06-01",
                "to": "2025-06-02",
                "includeLow": true,
                "includeHigh": false
            })
        );
    }

    #[test]
    fn inclusive_kind_sends_end_of_last_day() {
        let req = build_request(
            ReportKind::DiscountTypes,
            at("2025-06-01 00:00:00"),
            at("2025-06-03 00:00:00"),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&req.filters()[DATE_DIMENSION]).unwrap(),
            json!({
                "filterType": "DateRange",
                "periodType": "CUSTOM",
                "from": "2025-06-01T00:00:00.000",
                "to": "2025-06-02T23:59:59.999",
                "includeLow": true,
                "includeHigh": true
            })
        );
    }

    #[test]
    fn extra_include_list_is_added() {
        let req = build_request(
            ReportKind::MarginCourier,
            at("2025-06-01 00:00:00"),
            at("2025-06-02 00:00:00"),
            &departments(),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&req.filters()[DEPARTMENT_DIMENSION]).unwrap(),
            json!({"filterType": "IncludeValues", "values": ["Авиагородок", "Домодедово"]})
        );
        assert_eq!(
            serde_json::to_value(&req.filters()["Delivery.ServiceType"]).unwrap(),
            json!({"filterType": "IncludeValues", "values": ["COURIER"]})
        );
    }

    #[test]
    fn extra_list_on_constrained_dimension_never_widens() {
        let extra = BTreeMap::from([(
            "Delivery.ServiceType".to_string(),
            vec!["COURIER".to_string(), "PICKUP".to_string()],
        )]);
        let req = build_request(
            ReportKind::MarginCourier,
            at("2025-06-01 00:00:00"),
            at("2025-06-02 00:00:00"),
            &extra,
        )
        .unwrap();
        assert_eq!(
            req.filters()["Delivery.ServiceType"],
            Filter::IncludeValues {
                values: BTreeSet::from(["COURIER".to_string()])
            }
        );
    }

    #[test]
    fn builder_is_deterministic() {
        let build = || {
            build_request(
                ReportKind::DiscountTypes,
                at("2025-06-01 00:00:00"),
                at("2025-06-08 00:00:00"),
                &departments(),
            )
            .unwrap()
        };
        assert_eq!(build(), build());
        assert_eq!(build().body(), build().body());
    }

    #[test]
    fn body_carries_grouping_and_aggregates() {
        let req = build_request(
            ReportKind::LoadHourly,
            at("2025-06-01 00:00:00"),
            at("2025-06-02 00:00:00"),
            &departments(),
        )
        .unwrap();
        let body = req.body();
        assert_eq!(body["reportType"], "SALES");
        assert_eq!(
            body["groupByRowFields"],
            json!(["OpenDate.Typed", "HourOpen", "Department"])
        );
        assert_eq!(body["groupByColFields"], json!([]));
        assert_eq!(
            body["aggregateFields"],
            json!(["UniqOrderId.OrdersCount", "DishSumInt", "DiscountSum"])
        );
        assert_eq!(
            body["filters"]["OrderType"]["values"],
            json!(["Delivery by courier", "Доставка самовывоз"])
        );
    }
}
