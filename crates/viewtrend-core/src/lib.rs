pub mod app_config;
pub mod config;
pub mod scopes;
pub mod source;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use scopes::{load_scopes, parse_scopes, validate_scope, ScopeConfig, ScopesFile};
pub use source::{MetricSource, Observation, SourceError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read scopes file {path}: {source}")]
    ScopesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scopes file: {0}")]
    ScopesFileParse(#[from] serde_yaml::Error),

    #[error("scopes validation failed: {0}")]
    Validation(String),
}
