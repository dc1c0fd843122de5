use crate::app_config::{AppConfig, Environment, IikoCredentials, KindFailurePolicy, SheetsConfig};
use crate::location::Location;
use crate::ConfigError;

const DEFAULT_DIRECT_SHEET_URL: &str =
    "https://docs.google.com/spreadsheets/d/1jq1dJdORNRbpboSd-miAglnnqyoK8328s1bwx5QuyHU/edit";
const DEFAULT_FOT_SHEET_URL: &str =
    "https://docs.google.com/spreadsheets/d/1JXwkPQtLKUvuf7q9HAqxUcEN52xvMoLc0E7Cr5mQwm8/edit";
const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

/// Upper bound for `OLAPSYNC_MERGE_BATCH_SIZE`. At eight binds per row (the
/// widest writer) this stays under Postgres's 65 535 bind parameters.
pub const MAX_MERGE_BATCH_SIZE: usize = 5_000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable holds an invalid value.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable holds an invalid value.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    // Blank values count as unset; `.env` files often carry `KEY=` placeholders.
    let get = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let first_of = |vars: &[&str]| -> Option<String> { vars.iter().find_map(|v| get(*v)) };

    let or_default = |var: &str, default: &str| -> String {
        get(var).unwrap_or_else(|| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    // Checked when a command connects; `sync --dry-run` never does.
    let database_url = first_of(&["DATABASE_URL", "NEON_DATABASE_URL"]).unwrap_or_default();

    let env = parse_environment(&or_default("OLAPSYNC_ENV", "development"))?;
    let log_level = or_default("OLAPSYNC_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("OLAPSYNC_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("OLAPSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("OLAPSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let iiko = match (
        first_of(&["IIKO_BASE_URL", "IIKO_API_URL"]),
        first_of(&["IIKO_LOGIN", "IIKO_API_LOGIN"]),
        first_of(&["IIKO_PASSWORD_SHA1", "IIKO_PASSWORD"]),
    ) {
        (Some(base_url), Some(login), Some(password)) => Some(IikoCredentials {
            base_url: base_url.trim_end_matches('/').to_string(),
            login,
            password,
        }),
        _ => None,
    };
    let iiko_auth_timeout_secs = parse_u64("IIKO_AUTH_TIMEOUT_SECS", "30")?;
    let iiko_report_timeout_secs = parse_u64("IIKO_REPORT_TIMEOUT_SECS", "120")?;

    let departments = match get("OLAPSYNC_DEPARTMENTS") {
        Some(raw) => parse_departments(&raw),
        None => Location::known_names(),
    };
    if departments.is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "OLAPSYNC_DEPARTMENTS".to_string(),
            reason: "at least one department is required".to_string(),
        });
    }

    let merge_batch_size = parse_usize("OLAPSYNC_MERGE_BATCH_SIZE", "500")?;
    if merge_batch_size == 0 || merge_batch_size > MAX_MERGE_BATCH_SIZE {
        return Err(ConfigError::InvalidEnvVar {
            var: "OLAPSYNC_MERGE_BATCH_SIZE".to_string(),
            reason: format!("must be between 1 and {MAX_MERGE_BATCH_SIZE}"),
        });
    }
    let fetch_max_retries = parse_u32("OLAPSYNC_FETCH_MAX_RETRIES", "0")?;
    let fetch_retry_backoff_ms = parse_u64("OLAPSYNC_FETCH_RETRY_BACKOFF_MS", "1000")?;
    let on_kind_failure =
        parse_kind_failure_policy(&or_default("OLAPSYNC_ON_KIND_FAILURE", "abort-family"))?;

    let sheets = get("GOOGLE_SHEETS_API_KEY").map(|api_key| SheetsConfig {
        api_key,
        base_url: or_default("SHEETS_API_BASE_URL", DEFAULT_SHEETS_BASE_URL),
        direct_url: or_default("SHEETS_DIRECT_URL", DEFAULT_DIRECT_SHEET_URL),
        direct_range: or_default("SHEETS_DIRECT_RANGE", "Директ"),
        fot_url: or_default("SHEETS_FOT_URL", DEFAULT_FOT_SHEET_URL),
        fot_range: or_default("SHEETS_FOT_RANGE", "A1:Z"),
    });

    let schedule_cron = or_default("OLAPSYNC_SCHEDULE_CRON", "0 0 6 * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        iiko,
        iiko_auth_timeout_secs,
        iiko_report_timeout_secs,
        departments,
        merge_batch_size,
        fetch_max_retries,
        fetch_retry_backoff_ms,
        on_kind_failure,
        sheets,
        schedule_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "OLAPSYNC_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_kind_failure_policy(s: &str) -> Result<KindFailurePolicy, ConfigError> {
    match s {
        "abort-family" => Ok(KindFailurePolicy::AbortFamily),
        "continue" => Ok(KindFailurePolicy::Continue),
        other => Err(ConfigError::InvalidEnvVar {
            var: "OLAPSYNC_ON_KIND_FAILURE".to_string(),
            reason: format!("expected 'abort-family' or 'continue', got '{other}'"),
        }),
    }
}

fn parse_departments(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
