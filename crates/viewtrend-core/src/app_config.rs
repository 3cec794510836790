use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide configuration, built once at startup and shared by reference.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub scopes_path: PathBuf,
    pub api_keys: Vec<String>,
    pub youtube_api_key: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_timeout_secs: u64,
    pub source_max_retries: u32,
    pub source_retry_backoff_ms: u64,
    /// Upper bound on one scope's whole fetch, across all regions and retries.
    pub ingest_cycle_timeout_secs: u64,
    pub ingest_cron: String,
    pub ingest_max_concurrent_scopes: usize,
    pub default_window_minutes: i64,
    /// Requests per minute across protected routes; `0` disables the limiter.
    pub rate_limit_per_minute: u32,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("scopes_path", &self.scopes_path)
            .field("database_url", &"[redacted]")
            .field("api_keys", &format!("[{} redacted]", self.api_keys.len()))
            .field(
                "youtube_api_key",
                &self.youtube_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("source_max_retries", &self.source_max_retries)
            .field("source_retry_backoff_ms", &self.source_retry_backoff_ms)
            .field("ingest_cycle_timeout_secs", &self.ingest_cycle_timeout_secs)
            .field("ingest_cron", &self.ingest_cron)
            .field(
                "ingest_max_concurrent_scopes",
                &self.ingest_max_concurrent_scopes,
            )
            .field("default_window_minutes", &self.default_window_minutes)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}
