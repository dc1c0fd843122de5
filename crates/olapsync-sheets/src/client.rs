//! Read-only client for the Google Sheets v4 `values` endpoint.

use std::time::Duration;

use olapsync_core::SheetsConfig;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SheetsError;

/// Cell grid as returned by the API: rows of loosely typed cells. Trailing
/// empty cells are omitted upstream, so rows may be ragged.
pub type ValueGrid = Vec<Vec<Value>>;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: ValueGrid,
}

pub struct SheetsClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl SheetsClient {
    /// # Errors
    ///
    /// Returns [`SheetsError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`SheetsError::InvalidSheetUrl`] if the API base URL does not parse.
    pub fn new(config: &SheetsConfig, timeout_secs: u64) -> Result<Self, SheetsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("olapsync/0.1 (sheets)")
            .build()?;
        let base_url =
            Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
                SheetsError::InvalidSheetUrl {
                    url: config.base_url.clone(),
                    reason: e.to_string(),
                }
            })?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Fetches `range` of the spreadsheet identified by `sheet` (a full URL
    /// or a bare spreadsheet id).
    ///
    /// # Errors
    ///
    /// - [`SheetsError::InvalidSheetUrl`] if no spreadsheet id can be found.
    /// - [`SheetsError::UnexpectedStatus`] on a non-2xx response.
    /// - [`SheetsError::Http`] on network failure.
    /// - [`SheetsError::Deserialize`] if the body is not a value range.
    pub async fn fetch_values(&self, sheet: &str, range: &str) -> Result<ValueGrid, SheetsError> {
        let id = spreadsheet_id(sheet)?;
        let url = self.values_url(&id, range)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !status.is_success() {
            return Err(SheetsError::UnexpectedStatus {
                status: status.as_u16(),
                range: range.to_string(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: ValueRange =
            serde_json::from_str(&body).map_err(|e| SheetsError::Deserialize {
                context: format!("values({id}, {range})"),
                source: e,
            })?;
        tracing::debug!(spreadsheet = %id, range, rows = parsed.values.len(), "sheet values fetched");
        Ok(parsed.values)
    }

    fn values_url(&self, id: &str, range: &str) -> Result<Url, SheetsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SheetsError::InvalidSheetUrl {
                url: self.base_url.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", id, "values", range]);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

/// Extracts the spreadsheet id from a sharing URL (`.../spreadsheets/d/<id>/edit`)
/// or accepts a bare id verbatim.
///
/// # Errors
///
/// Returns [`SheetsError::InvalidSheetUrl`] when the input is blank or is a
/// URL without a `/d/<id>` segment.
pub fn spreadsheet_id(sheet: &str) -> Result<String, SheetsError> {
    let trimmed = sheet.trim();
    let invalid = |reason: &str| SheetsError::InvalidSheetUrl {
        url: sheet.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    if let Some((_, rest)) = trimmed.split_once("/d/") {
        let id: String = rest
            .chars()
            .take_while(|c| !matches!(c, '/' | '?' | '#'))
            .collect();
        return if id.is_empty() {
            Err(invalid("no spreadsheet id after /d/"))
        } else {
            Ok(id)
        };
    }

    if trimmed.contains('/') {
        return Err(invalid("expected /spreadsheets/d/<id>/"));
    }
    Ok(trimmed.to_string())
}
