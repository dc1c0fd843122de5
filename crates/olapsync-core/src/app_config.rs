use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// What the orchestrator does when one report kind fails inside a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFailurePolicy {
    /// Stop the remaining kinds of the same family (historical behavior).
    AbortFamily,
    /// Record the failure and keep going with the next kind.
    Continue,
}

impl fmt::Display for KindFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindFailurePolicy::AbortFamily => write!(f, "abort-family"),
            KindFailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

#[derive(Clone)]
pub struct IikoCredentials {
    pub base_url: String,
    pub login: String,
    pub password: String,
}

impl fmt::Debug for IikoCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IikoCredentials")
            .field("base_url", &self.base_url)
            .field("login", &self.login)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct SheetsConfig {
    pub api_key: String,
    pub base_url: String,
    pub direct_url: String,
    pub direct_range: String,
    pub fot_url: String,
    pub fot_range: String,
}

impl fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("direct_url", &self.direct_url)
            .field("direct_range", &self.direct_range)
            .field("fot_url", &self.fot_url)
            .field("fot_range", &self.fot_range)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Empty when unset. Commands that connect reject it then.
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// `None` when any of the iiko variables is unset; `sync` then fails the
    /// iiko family up front.
    pub iiko: Option<IikoCredentials>,
    pub iiko_auth_timeout_secs: u64,
    pub iiko_report_timeout_secs: u64,
    pub departments: Vec<String>,
    pub merge_batch_size: usize,
    pub fetch_max_retries: u32,
    pub fetch_retry_backoff_ms: u64,
    pub on_kind_failure: KindFailurePolicy,
    /// `None` when `GOOGLE_SHEETS_API_KEY` is unset; the spreadsheet family is
    /// then skipped rather than failed.
    pub sheets: Option<SheetsConfig>,
    pub schedule_cron: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("iiko", &self.iiko)
            .field("iiko_auth_timeout_secs", &self.iiko_auth_timeout_secs)
            .field("iiko_report_timeout_secs", &self.iiko_report_timeout_secs)
            .field("departments", &self.departments)
            .field("merge_batch_size", &self.merge_batch_size)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("fetch_retry_backoff_ms", &self.fetch_retry_backoff_ms)
            .field("on_kind_failure", &self.on_kind_failure)
            .field("sheets", &self.sheets)
            .field("schedule_cron", &self.schedule_cron)
            .finish()
    }
}
