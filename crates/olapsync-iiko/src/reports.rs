//! Catalog of the OLAP report kinds this crate knows how to request and read.
//!
//! Each [`ReportSpec`] is static data: what to group by, what to aggregate,
//! which include-lists always apply, how the date bound is expressed, and the
//! ordered alias list for every canonical field. Aliases exist because the
//! upstream schema has drifted; the first alias present in a record wins.

use std::fmt;

use crate::filters::DateBound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportKind {
    MarginAll,
    MarginCourier,
    MarginPickup,
    LoadHourly,
    DiscountTypes,
}

impl ReportKind {
    /// Every kind in the order a run processes them.
    pub const SEQUENCE: [ReportKind; 5] = [
        ReportKind::MarginAll,
        ReportKind::MarginCourier,
        ReportKind::MarginPickup,
        ReportKind::LoadHourly,
        ReportKind::DiscountTypes,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::MarginAll => "margin-all",
            ReportKind::MarginCourier => "margin-courier",
            ReportKind::MarginPickup => "margin-pickup",
            ReportKind::LoadHourly => "load-hourly",
            ReportKind::DiscountTypes => "discount-types",
        }
    }

    #[must_use]
    pub fn spec(self) -> &'static ReportSpec {
        match self {
            ReportKind::MarginAll => &MARGIN_ALL,
            ReportKind::MarginCourier => &MARGIN_COURIER,
            ReportKind::MarginPickup => &MARGIN_PICKUP,
            ReportKind::LoadHourly => &LOAD_HOURLY,
            ReportKind::DiscountTypes => &DISCOUNT_TYPES,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric field of the normalized row and where to find it in a record.
#[derive(Debug)]
pub struct MeasureSpec {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
    /// Counts are truncated to whole numbers.
    pub integral: bool,
}

#[derive(Debug)]
pub struct ReportSpec {
    pub kind: ReportKind,
    pub report_type: &'static str,
    pub group_by: &'static [&'static str],
    pub aggregates: &'static [&'static str],
    pub date_bound: DateBound,
    /// Include-lists that always apply to this kind: `(dimension, allowed values)`.
    pub static_filters: &'static [(&'static str, &'static [&'static str])],
    pub location: &'static [&'static str],
    pub day: &'static [&'static str],
    /// `Some` when the kind is keyed by hour of day.
    pub hour: Option<&'static [&'static str]>,
    /// `Some` when the kind is keyed by a free-text category.
    pub category: Option<&'static [&'static str]>,
    pub measures: &'static [MeasureSpec],
}

pub const DATE_DIMENSION: &str = "OpenDate.Typed";
pub const DEPARTMENT_DIMENSION: &str = "Department";

const LOCATION_ALIASES: &[&str] = &["Department", "department"];
const DAY_ALIASES: &[&str] = &["OpenDate.Typed", "date"];
const HOUR_ALIASES: &[&str] = &["HourOpen", "hour"];

const NOT_DELETED: &[&str] = &["NOT_DELETED"];
const NOT_STORNED: &[&str] = &["FALSE"];

const MARGIN_GROUP_BY: &[&str] = &["Department", "OpenDate.Typed"];
const MARGIN_AGGREGATES: &[&str] = &["DishSumInt", "DiscountSum", "ProductCostBase.ProductCost"];
const MARGIN_MEASURES: &[MeasureSpec] = &[
    MeasureSpec {
        field: "revenue",
        aliases: &["DishSumInt", "revenue", "dish_sum_int"],
        integral: false,
    },
    MeasureSpec {
        field: "discount",
        aliases: &["DiscountSum", "discount_sum"],
        integral: false,
    },
    MeasureSpec {
        field: "product_cost",
        aliases: &["ProductCostBase.ProductCost", "product_cost"],
        integral: false,
    },
];

static MARGIN_ALL: ReportSpec = ReportSpec {
    kind: ReportKind::MarginAll,
    static_filters: &[
        ("Storned", NOT_STORNED),
        ("DeletedWithWriteoff", NOT_DELETED),
        ("OrderDeleted", NOT_DELETED),
    ],
    ..MARGIN_BASE
};

static MARGIN_COURIER: ReportSpec = ReportSpec {
    kind: ReportKind::MarginCourier,
    static_filters: &[
        ("Storned", NOT_STORNED),
        ("DeletedWithWriteoff", NOT_DELETED),
        ("OrderDeleted", NOT_DELETED),
        ("Delivery.ServiceType", &["COURIER"]),
    ],
    ..MARGIN_BASE
};

static MARGIN_PICKUP: ReportSpec = ReportSpec {
    kind: ReportKind::MarginPickup,
    static_filters: &[
        ("Storned", NOT_STORNED),
        ("DeletedWithWriteoff", NOT_DELETED),
        ("OrderDeleted", NOT_DELETED),
        ("Delivery.ServiceType", &["PICKUP"]),
    ],
    ..MARGIN_BASE
};

const MARGIN_BASE: ReportSpec = ReportSpec {
    kind: ReportKind::MarginAll,
    report_type: "SALES",
    group_by: MARGIN_GROUP_BY,
    aggregates: MARGIN_AGGREGATES,
    date_bound: DateBound::ExclusiveNextDay,
    static_filters: &[],
    location: LOCATION_ALIASES,
    day: DAY_ALIASES,
    hour: None,
    category: None,
    measures: MARGIN_MEASURES,
};

static LOAD_HOURLY: ReportSpec = ReportSpec {
    kind: ReportKind::LoadHourly,
    report_type: "SALES",
    group_by: &["OpenDate.Typed", "HourOpen", "Department"],
    aggregates: &["UniqOrderId.OrdersCount", "DishSumInt", "DiscountSum"],
    date_bound: DateBound::ExclusiveNextDay,
    static_filters: &[
        ("DeletedWithWriteoff", NOT_DELETED),
        ("OrderDeleted", NOT_DELETED),
        ("Storned", NOT_STORNED),
        ("OrderType", &["Delivery by courier", "Доставка самовывоз"]),
    ],
    location: LOCATION_ALIASES,
    day: DAY_ALIASES,
    hour: Some(HOUR_ALIASES),
    category: None,
    measures: &[
        MeasureSpec {
            field: "orders_count",
            aliases: &["UniqOrderId.OrdersCount", "orders_count"],
            integral: true,
        },
        MeasureSpec {
            field: "revenue",
            aliases: &["DishDiscountSumInt", "DishSumInt", "revenue"],
            integral: false,
        },
        MeasureSpec {
            field: "discount",
            aliases: &["DiscountSum", "discount_sum"],
            integral: false,
        },
    ],
};

static DISCOUNT_TYPES: ReportSpec = ReportSpec {
    kind: ReportKind::DiscountTypes,
    report_type: "SALES",
    group_by: &["Department", "OpenDate.Typed", "OrderDiscount.Type"],
    aggregates: &[
        "UniqOrderId.OrdersCount",
        "DishDiscountSumInt",
        "DiscountSum",
        "DishDiscountSumInt.average",
    ],
    date_bound: DateBound::InclusiveEndOfDay,
    static_filters: &[
        ("Storned", NOT_STORNED),
        ("DeletedWithWriteoff", NOT_DELETED),
        ("OrderDeleted", NOT_DELETED),
    ],
    location: LOCATION_ALIASES,
    day: DAY_ALIASES,
    hour: None,
    category: Some(&["OrderDiscount.Type", "discount_type"]),
    measures: &[
        MeasureSpec {
            field: "orders_count",
            aliases: &["UniqOrderId.OrdersCount", "orders_count"],
            integral: true,
        },
        MeasureSpec {
            field: "revenue",
            aliases: &["DishDiscountSumInt", "DishSumInt", "revenue"],
            integral: false,
        },
        MeasureSpec {
            field: "discount",
            aliases: &["DiscountSum", "discount_sum"],
            integral: false,
        },
        MeasureSpec {
            field: "average_check",
            aliases: &["DishDiscountSumInt.average", "average_check"],
            integral: false,
        },
    ],
};
