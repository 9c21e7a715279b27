use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allow any origin to call the API (the public page is usually served
    /// from a different origin than the API)
    pub allow_any_origin: bool,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` is a thin wrapper over this; tests pass a map instead of
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_str = lookup("DATABASE_BACKEND").unwrap_or_else(|| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./linkhub.db?mode=rwc".to_string());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            None => DatabaseConfig::default_max_connections(),
        };

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let api_port = lookup("API_PORT")
            .unwrap_or_else(|| "3001".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let allow_any_origin = lookup("CORS_ALLOW_ANY")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections: max_connections.max(1),
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            cors: CorsConfig { allow_any_origin },
        })
    }
}
