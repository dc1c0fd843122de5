use thiserror::Error;

use crate::reports::ReportKind;

/// Errors returned by the iiko OLAP client.
#[derive(Debug, Error)]
pub enum IikoError {
    /// Authentication failed or returned an empty token. Fatal to the run.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The report endpoint answered with a non-success status.
    #[error("report {kind} failed with HTTP {status}: {body}")]
    ReportFetch {
        kind: ReportKind,
        status: u16,
        /// Response body, truncated for diagnosis.
        body: String,
    },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not JSON of any accepted shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The requested date range contains no days.
    #[error("empty date range: {from} .. {to}")]
    InvalidRange { from: String, to: String },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
