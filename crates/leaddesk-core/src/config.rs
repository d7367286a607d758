use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("LEADDESK_ENV", "development"))?;
    let bind_addr = parse_addr("LEADDESK_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("LEADDESK_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("LEADDESK_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("LEADDESK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("LEADDESK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let openai_api_key = lookup("OPENAI_API_KEY")
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());
    let scoring_model = or_default("LEADDESK_SCORING_MODEL", "gpt-4o-mini");
    let scoring_base_url = or_default("LEADDESK_SCORING_BASE_URL", "https://api.openai.com/v1");

    let scoring_timeout_secs = parse_u64("LEADDESK_SCORING_TIMEOUT_SECS", "12")?;
    if !(1..=60).contains(&scoring_timeout_secs) {
        return Err(invalid(
            "LEADDESK_SCORING_TIMEOUT_SECS",
            format!("must be between 1 and 60, got {scoring_timeout_secs}"),
        ));
    }
    let scoring_max_retries = parse_u32("LEADDESK_SCORING_MAX_RETRIES", "1")?;

    let hot_lead_threshold = lookup("LEADDESK_HOT_LEAD_THRESHOLD")
        .unwrap_or_else(|_| crate::HOT_LEAD_THRESHOLD.to_string())
        .parse::<u8>()
        .map_err(|e| invalid("LEADDESK_HOT_LEAD_THRESHOLD", e.to_string()))?;
    if !(1..=10).contains(&hot_lead_threshold) {
        return Err(invalid(
            "LEADDESK_HOT_LEAD_THRESHOLD",
            format!("must be between 1 and 10, got {hot_lead_threshold}"),
        ));
    }

    let keywords_path = lookup("LEADDESK_KEYWORDS_PATH").ok().map(PathBuf::from);
    let rate_limit_per_minute = parse_usize("LEADDESK_RATE_LIMIT_PER_MINUTE", "600")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        openai_api_key,
        scoring_model,
        scoring_base_url,
        scoring_timeout_secs,
        scoring_max_retries,
        hot_lead_threshold,
        keywords_path,
        rate_limit_per_minute,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LEADDESK_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
