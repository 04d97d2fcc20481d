// region:    --- Imports
use std::env;
use std::str::FromStr;
use tracing::info;

// endregion: --- Imports

// region:    --- Config
/// Runtime settings, read from the process environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Drop and recreate all tables on startup.
    pub reset_database: bool,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            reset_database: false,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("{:<12} --> loaded {}", "Config", path.display());
        }
        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            reset_database: parse_var("DATABASE_RESET")?.unwrap_or(defaults.reset_database),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value.trim().parse().ok();
            parsed.map(Some).ok_or(ConfigError { key, value })
        }
        Err(_) => Ok(None),
    }
}
// endregion: --- Config
