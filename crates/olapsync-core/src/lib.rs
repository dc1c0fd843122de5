pub mod app_config;
pub mod coerce;
pub mod config;
pub mod location;
pub mod row;

pub use app_config::{AppConfig, Environment, IikoCredentials, KindFailurePolicy, SheetsConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use location::Location;
pub use row::{ConflictKey, DateRange, NormalizedRow};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
