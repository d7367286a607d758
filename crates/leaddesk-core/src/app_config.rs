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

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// `None` runs the pipeline on the deterministic scorer only.
    pub openai_api_key: Option<String>,
    pub scoring_model: String,
    pub scoring_base_url: String,
    pub scoring_timeout_secs: u64,
    pub scoring_max_retries: u32,
    pub hot_lead_threshold: u8,
    pub keywords_path: Option<PathBuf>,
    pub rate_limit_per_minute: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("scoring_model", &self.scoring_model)
            .field("scoring_base_url", &self.scoring_base_url)
            .field("scoring_timeout_secs", &self.scoring_timeout_secs)
            .field("scoring_max_retries", &self.scoring_max_retries)
            .field("hot_lead_threshold", &self.hot_lead_threshold)
            .field("keywords_path", &self.keywords_path)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}
