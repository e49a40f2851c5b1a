//! Process configuration loaded from environment variables.

use std::{env, fmt, net::SocketAddr, str::FromStr};

use thiserror::Error;

use crate::store::StoreLocation;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://todo-app.db";

/// Deployment mode. Controls startup strictness and error detail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    /// Error responses carry a `stack` field only in development.
    pub fn exposes_error_detail(self) -> bool {
        self == Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid PORT `{0}`")]
    InvalidPort(String),

    #[error("invalid HOST `{0}`")]
    InvalidHost(String),

    #[error("unknown APP_ENV `{0}` (expected development, production or test)")]
    UnknownEnvironment(String),

    #[error("unsupported DATABASE_URL `{0}` (expected memory://, sqlite::memory: or sqlite://<path>)")]
    UnsupportedDatabaseUrl(String),

    #[error("DATABASE_URL is required in production")]
    MissingDatabaseUrl,
}

/// Settings for one server process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub store: StoreLocation,
    pub environment: Environment,
    /// Allowed CORS origin; `*` allows any.
    pub frontend_url: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_ENV") {
            Some(raw) => raw.parse()?,
            None => Environment::default(),
        };

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let ip = host
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHost(host.clone()))?;

        let database_url = match get("DATABASE_URL").or_else(|| get("TODO_DATABASE_URL")) {
            Some(url) => url,
            None if environment.is_production() => return Err(ConfigError::MissingDatabaseUrl),
            None => DEFAULT_DATABASE_URL.to_string(),
        };
        let store = StoreLocation::parse(&database_url)
            .ok_or_else(|| ConfigError::UnsupportedDatabaseUrl(database_url.clone()))?;

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            database_url,
            store,
            environment,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| "*".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(
            config.store,
            StoreLocation::SqliteFile("todo-app.db".into())
        );
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.frontend_url, "*");
    }

    #[test]
    fn reads_all_variables() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_URL", "memory://"),
            ("APP_ENV", "production"),
            ("FRONTEND_URL", "https://todo.example.com"),
        ])
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.store, StoreLocation::Memory);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.frontend_url, "https://todo.example.com");
    }

    #[test]
    fn falls_back_to_secondary_database_variable() {
        let config = load(&[("TODO_DATABASE_URL", "sqlite::memory:")]).unwrap();
        assert_eq!(config.store, StoreLocation::SqliteMemory);
    }

    #[test]
    fn production_requires_database_url() {
        assert_eq!(
            load(&[("APP_ENV", "production")]),
            Err(ConfigError::MissingDatabaseUrl)
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidPort("eighty".to_string()))
        );
        assert_eq!(
            load(&[("APP_ENV", "staging")]),
            Err(ConfigError::UnknownEnvironment("staging".to_string()))
        );
        assert!(matches!(
            load(&[("DATABASE_URL", "mongodb://localhost/todo-app")]),
            Err(ConfigError::UnsupportedDatabaseUrl(_))
        ));
    }

    #[test]
    fn only_development_exposes_error_detail() {
        assert!(Environment::Development.exposes_error_detail());
        assert!(!Environment::Production.exposes_error_detail());
        assert!(!Environment::Test.exposes_error_detail());
    }
}
