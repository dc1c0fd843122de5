//! HTTP client for the iiko server OLAP API.
//!
//! Holds the `reqwest` client, base URL, credentials and per-call timeouts.
//! The client itself never holds a token: sessions are explicit values
//! (see [`crate::session`]) passed into each fetch.

use std::time::Duration;

use olapsync_core::IikoCredentials;
use reqwest::{Client, Url};

use crate::error::IikoError;

/// Responses longer than this are cut before being stored in an error.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 500;

const LOGOUT_TIMEOUT_CAP: Duration = Duration::from_secs(10);

/// Client for one iiko server.
///
/// Cheap to clone; concurrent runs each acquire their own
/// [`Session`](crate::Session).
#[derive(Clone)]
pub struct IikoClient {
    client: Client,
    base_url: Url,
    login: String,
    password: String,
    auth_timeout: Duration,
    report_timeout: Duration,
}

impl IikoClient {
    /// Creates a client from configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`IikoError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed, or [`IikoError::InvalidBaseUrl`] if the configured base
    /// URL does not parse.
    pub fn new(
        credentials: &IikoCredentials,
        auth_timeout_secs: u64,
        report_timeout_secs: u64,
    ) -> Result<Self, IikoError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("olapsync/0.1 (iiko-olap)")
            .build()?;

        // Exactly one trailing slash so that `Url::join` appends below the
        // configured path (`.../resto/`) instead of replacing its last segment.
        let normalised = format!("{}/", credentials.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| IikoError::InvalidBaseUrl {
            url: credentials.base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            login: credentials.login.clone(),
            password: credentials.password.clone(),
            auth_timeout: Duration::from_secs(auth_timeout_secs),
            report_timeout: Duration::from_secs(report_timeout_secs),
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn login(&self) -> &str {
        &self.login
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub(crate) fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    pub(crate) fn logout_timeout(&self) -> Duration {
        self.auth_timeout.min(LOGOUT_TIMEOUT_CAP)
    }

    pub(crate) fn report_timeout(&self) -> Duration {
        self.report_timeout
    }

    /// Joins `path` onto the base URL and appends percent-encoded query pairs.
    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, IikoError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| IikoError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

/// Cuts a response body to at most [`MAX_ERROR_BODY_CHARS`] characters.
pub(crate) fn truncate_body(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(MAX_ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
