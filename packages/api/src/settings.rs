//! # Runtime settings
//!
//! Loaded with the `config` crate, later sources overriding earlier ones:
//!
//! 1. built-in defaults (a local PostgreSQL named `scaffold`, port 8080);
//! 2. an optional `config.toml` in the working directory;
//! 3. `APP__`-prefixed environment variables, `__` between levels
//!    (`APP__SERVER__PORT=9000`, `APP__DATABASE__HOST=db`);
//! 4. `DATABASE_URL`, which replaces the composed connection string outright.
//!
//! `.env` is read through `dotenvy` before the environment is consulted.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Full connection string. Takes precedence over the individual parts.
    #[serde(default)]
    pub url: Option<String>,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseSettings {
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            ),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        defaults()?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("APP").separator("__"))
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }

    /// Defaults plus the given TOML document, ignoring files and the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("database.user", "scaffold")?
        .set_default("database.password", "password")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.database", "scaffold")?
        .set_default("database.max_connections", 5)?
        .set_default("database.acquire_timeout_secs", 5)?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.request_timeout_secs", 30)
}
