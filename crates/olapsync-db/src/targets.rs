//! Declared merge targets. Column groups within a target never overlap;
//! every target is checked by the tests below.

use crate::merge::{ColumnGroup, KeyColumn, KeyPart, MergeTarget};

const DEPARTMENT: KeyColumn = KeyColumn {
    column: "department",
    part: KeyPart::Location,
};
const OPER_DAY: KeyColumn = KeyColumn {
    column: "oper_day",
    part: KeyPart::Day,
};
const REPORT_DATE: KeyColumn = KeyColumn {
    column: "report_date",
    part: KeyPart::Day,
};

/// Daily margin. Three jobs share each row: all orders, courier delivery
/// only, and pickup only. No single source record describes the row, so
/// there is no raw column.
pub static MARGIN_IIKO: MergeTarget = MergeTarget {
    table: "margin_iiko",
    key: &[DEPARTMENT, OPER_DAY],
    groups: &[
        ColumnGroup {
            name: "all",
            columns: &[
                ("revenue", "revenue"),
                ("discount", "discount"),
                ("product_cost", "product_cost"),
            ],
        },
        ColumnGroup {
            name: "courier",
            columns: &[
                ("revenue", "revenue_courier"),
                ("discount", "discount_courier"),
                ("product_cost", "product_cost_courier"),
            ],
        },
        ColumnGroup {
            name: "pickup",
            columns: &[
                ("revenue", "revenue_pickup"),
                ("discount", "discount_pickup"),
                ("product_cost", "product_cost_pickup"),
            ],
        },
    ],
    raw_column: None,
};

pub static LOAD_HOURLY_IIKO: MergeTarget = MergeTarget {
    table: "load_hourly_iiko",
    key: &[
        DEPARTMENT,
        OPER_DAY,
        KeyColumn {
            column: "hour",
            part: KeyPart::Hour,
        },
    ],
    groups: &[ColumnGroup {
        name: "all",
        columns: &[
            ("orders_count", "orders_count"),
            ("revenue", "revenue"),
            ("discount", "discount"),
        ],
    }],
    raw_column: Some("raw_data"),
};

pub static DISCOUNT_TYPES_IIKO: MergeTarget = MergeTarget {
    table: "discount_types_iiko",
    key: &[
        DEPARTMENT,
        OPER_DAY,
        KeyColumn {
            column: "discount_type",
            part: KeyPart::Category,
        },
    ],
    groups: &[ColumnGroup {
        name: "all",
        columns: &[
            ("orders_count", "orders_count"),
            ("revenue", "revenue"),
            ("discount", "discount"),
            ("average_check", "average_check"),
        ],
    }],
    raw_column: Some("raw_data"),
};

pub static SHEETS_DIRECT: MergeTarget = MergeTarget {
    table: "sheets_direct",
    key: &[DEPARTMENT, REPORT_DATE],
    groups: &[ColumnGroup {
        name: "direct",
        columns: &[("ad_budget", "ad_budget"), ("fot_direct", "fot_direct")],
    }],
    raw_column: Some("raw_data"),
};

pub static SHEETS_FOT: MergeTarget = MergeTarget {
    table: "sheets_fot",
    key: &[DEPARTMENT, REPORT_DATE],
    groups: &[ColumnGroup {
        name: "fot",
        columns: &[
            ("fot_couriers", "fot_couriers"),
            ("fot_cooks", "fot_cooks"),
            ("fot_cleaners", "fot_cleaners"),
        ],
    }],
    raw_column: Some("raw_data"),
};

pub static ALL_TARGETS: [&MergeTarget; 5] = [
    &MARGIN_IIKO,
    &LOAD_HOURLY_IIKO,
    &DISCOUNT_TYPES_IIKO,
    &SHEETS_DIRECT,
    &SHEETS_FOT,
];
