//! Google Sheets source: fetches hand-maintained cost sheets and normalizes
//! them into rows keyed by `(department, report_date)`.

pub mod client;
pub mod error;
pub mod layout;
pub mod normalize;

pub use client::{spreadsheet_id, SheetsClient, ValueGrid};
pub use error::SheetsError;
pub use layout::{ColumnMap, Role, SheetKind};
pub use normalize::{normalize_sheet, SheetRows, SheetStats};
