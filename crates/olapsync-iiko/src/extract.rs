//! Report extraction: one POST per [`ReportRequest`], tolerant of the
//! several response shapes the OLAP endpoint has produced over time.

use serde_json::{Map, Value};

use crate::client::{truncate_body, IikoClient};
use crate::error::IikoError;
use crate::filters::ReportRequest;
use crate::session::Session;

/// One untyped record from a report response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// The record as a JSON object, for audit storage.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The first alias whose value is present, not `null`, and not a blank
    /// string.
    #[must_use]
    pub fn first_present(&self, aliases: &[&str]) -> Option<&Value> {
        aliases.iter().find_map(|alias| {
            self.0.get(*alias).filter(|v| match v {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl IikoClient {
    /// Fetches every record of `request` using `session`.
    ///
    /// Does not retry; callers decide whether a failure is worth repeating.
    ///
    /// # Errors
    ///
    /// - [`IikoError::ReportFetch`] on a non-2xx status, with the body cut to
    ///   500 characters.
    /// - [`IikoError::Http`] on network failure or timeout.
    /// - [`IikoError::Deserialize`] if the body is not JSON.
    pub async fn fetch(
        &self,
        session: &Session,
        request: &ReportRequest,
    ) -> Result<Vec<RawRecord>, IikoError> {
        let kind = request.kind();
        let url = self.endpoint("api/v2/reports/olap", &[("key", session.token())])?;

        let response = self
            .http()
            .post(url)
            .timeout(self.report_timeout())
            .json(&request.body())
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !status.is_success() {
            return Err(IikoError::ReportFetch {
                kind,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| IikoError::Deserialize {
            context: format!("report {kind}"),
            source: e,
        })?;
        let records = records_from_value(value);
        tracing::debug!(%kind, records = records.len(), "report fetched");
        Ok(records)
    }
}

/// Flattens any accepted response shape into a list of records.
///
/// Accepted: `{"data": [..]}`, `{"rows": [..]}`, a bare array, or a single
/// flat object (one record). Array elements that are not objects are skipped.
#[must_use]
pub fn records_from_value(value: Value) -> Vec<RawRecord> {
    match value {
        Value::Array(items) => objects(items),
        Value::Object(mut map) => {
            for wrapper in ["data", "rows"] {
                if matches!(map.get(wrapper), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(wrapper) {
                        return objects(items);
                    }
                }
            }
            vec![RawRecord(map)]
        }
        other => {
            tracing::warn!(kind = json_kind(&other), "report body is not an object or array");
            Vec::new()
        }
    }
}

fn objects(items: Vec<Value>) -> Vec<RawRecord> {
    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(RawRecord(map)),
            _ => None,
        })
        .collect();
    if records.len() < total {
        tracing::debug!(skipped = total - records.len(), "non-object report rows skipped");
    }
    records
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
