//! Client for the iiko server OLAP reporting API.
//!
//! A run authenticates once ([`IikoClient::with_session`]), builds one
//! [`ReportRequest`] per [`ReportKind`], fetches the raw records, and turns
//! them into [`olapsync_core::NormalizedRow`]s with [`normalize`].

pub mod client;
pub mod error;
pub mod extract;
pub mod filters;
pub mod normalize;
pub mod reports;
pub mod retry;
pub mod session;

pub use client::IikoClient;
pub use error::IikoError;
pub use extract::{records_from_value, RawRecord};
pub use filters::{build_for_range, build_request, DateBound, Filter, ReportRequest};
pub use normalize::{normalize, NormalizeStats, Normalized};
pub use reports::{ReportKind, ReportSpec, DATE_DIMENSION, DEPARTMENT_DIMENSION};
pub use retry::{is_retriable, retry_with_backoff};
pub use session::Session;
