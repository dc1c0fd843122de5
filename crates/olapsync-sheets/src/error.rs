use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} for range \"{range}\": {body}")]
    UnexpectedStatus {
        status: u16,
        range: String,
        body: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid sheet URL \"{url}\": {reason}")]
    InvalidSheetUrl { url: String, reason: String },
}
