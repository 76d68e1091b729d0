use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL for {name}: {message}")]
    InvalidUrl { name: String, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub datastore: DatastoreConfig,
    pub action: ActionConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which HTTP servers a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Action,
    Presenter,
    All,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Action => "action",
            Component::Presenter => "presenter",
            Component::All => "all",
        };
        f.write_str(name)
    }
}

impl FromStr for Component {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "action" => Ok(Component::Action),
            "presenter" => Ok(Component::Presenter),
            "all" => Ok(Component::All),
            _ => Err(ConfigError::InvalidValue {
                key: "BACKEND_COMPONENT".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreBackend {
    Memory,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub component: Component,
    pub action_address: String,
    pub presenter_address: String,
    pub worker_timeout_secs: u64,
}

impl ServerConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }
}

/// Endpoint assembled from `<PREFIX>_{PROTOCOL,HOST,PORT,PATH}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ServiceEndpoint {
    fn new(host: &str, port: u16, path: &str) -> Self {
        Self {
            protocol: "http".to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        }
    }

    pub fn url(&self, name: &str) -> Result<Url, ConfigError> {
        let raw = format!("{}://{}:{}{}", self.protocol, self.host, self.port, self.path);
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            name: name.to_string(),
            message: format!("{} ({})", raw, e),
        })
    }

    fn apply(&mut self, prefix: &str, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(&format!("{}_PROTOCOL", prefix)) {
            self.protocol = v;
        }
        if let Some(v) = lookup(&format!("{}_HOST", prefix)) {
            self.host = v;
        }
        if let Some(v) = lookup(&format!("{}_PORT", prefix)) {
            self.port = v.parse().unwrap_or(self.port);
        }
        if let Some(v) = lookup(&format!("{}_PATH", prefix)) {
            self.path = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    pub backend: DatastoreBackend,
    pub reader: ServiceEndpoint,
    pub writer: ServiceEndpoint,
    /// JSON file seeding the memory backend
    pub initial_data: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub token_secret: String,
    pub allow_guest: bool,
    pub token_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparsable values keep the preset
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Server overrides
        if let Some(v) = lookup("BACKEND_COMPONENT") {
            self.server.component = v.parse().unwrap_or(self.server.component);
        }
        if let Some(v) = lookup("ACTION_ADDRESS") {
            self.server.action_address = v;
        }
        if let Some(v) = lookup("PRESENTER_ADDRESS") {
            self.server.presenter_address = v;
        }
        if let Some(v) = lookup("BACKEND_WORKER_TIMEOUT") {
            self.server.worker_timeout_secs = v.parse().unwrap_or(self.server.worker_timeout_secs);
        }

        // Datastore overrides
        if let Some(v) = lookup("DATASTORE_BACKEND") {
            self.datastore.backend = match v.to_ascii_lowercase().as_str() {
                "http" => DatastoreBackend::Http,
                "memory" => DatastoreBackend::Memory,
                _ => self.datastore.backend,
            };
        }
        self.datastore.reader.apply("DATASTORE_READER", &lookup);
        self.datastore.writer.apply("DATASTORE_WRITER", &lookup);
        if let Some(v) = lookup("DATASTORE_INITIAL_DATA") {
            self.datastore.initial_data = Some(v).filter(|path| !path.is_empty());
        }
        if let Some(v) = lookup("DATASTORE_REQUEST_TIMEOUT") {
            self.datastore.request_timeout_secs = v.parse().unwrap_or(self.datastore.request_timeout_secs);
        }

        // Action overrides
        if let Some(v) = lookup("ACTION_MAX_RETRIES") {
            self.action.max_retries = v.parse().unwrap_or(self.action.max_retries);
        }
        if let Some(v) = lookup("ACTION_RETRY_BACKOFF_MS") {
            self.action.retry_backoff_ms = v.parse().unwrap_or(self.action.retry_backoff_ms);
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("AUTH_TOKEN_SECRET") {
            self.security.token_secret = v;
        }
        if let Some(v) = lookup("AUTH_ALLOW_GUEST") {
            self.security.allow_guest = v.parse().unwrap_or(self.security.allow_guest);
        }
        if let Some(v) = lookup("AUTH_TOKEN_EXPIRY_HOURS") {
            self.security.token_expiry_hours = v.parse().unwrap_or(self.security.token_expiry_hours);
        }

        // Logging overrides
        if let Some(v) = lookup("BACKEND_DEBUG") {
            self.logging.debug = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                component: Component::All,
                action_address: "0.0.0.0:9002".to_string(),
                presenter_address: "0.0.0.0:9003".to_string(),
                worker_timeout_secs: 30,
            },
            datastore: DatastoreConfig {
                backend: DatastoreBackend::Memory,
                reader: ServiceEndpoint::new("localhost", 9010, "/internal/datastore/reader"),
                writer: ServiceEndpoint::new("localhost", 9011, "/internal/datastore/writer"),
                initial_data: None,
                request_timeout_secs: 10,
            },
            action: ActionConfig {
                max_retries: 3,
                retry_backoff_ms: 50,
            },
            security: SecurityConfig {
                enable_cors: true,
                token_secret: "development-secret".to_string(),
                allow_guest: true,
                token_expiry_hours: 24 * 7, // 1 week
            },
            logging: LoggingConfig { debug: true },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                component: Component::All,
                action_address: "0.0.0.0:9002".to_string(),
                presenter_address: "0.0.0.0:9003".to_string(),
                worker_timeout_secs: 30,
            },
            datastore: DatastoreConfig {
                backend: DatastoreBackend::Http,
                reader: ServiceEndpoint::new("datastore-reader", 9010, "/internal/datastore/reader"),
                writer: ServiceEndpoint::new("datastore-writer", 9011, "/internal/datastore/writer"),
                initial_data: None,
                request_timeout_secs: 10,
            },
            action: ActionConfig {
                max_retries: 3,
                retry_backoff_ms: 50,
            },
            security: SecurityConfig {
                enable_cors: true,
                token_secret: String::new(),
                allow_guest: true,
                token_expiry_hours: 24,
            },
            logging: LoggingConfig { debug: false },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                component: Component::All,
                action_address: "0.0.0.0:9002".to_string(),
                presenter_address: "0.0.0.0:9003".to_string(),
                worker_timeout_secs: 30,
            },
            datastore: DatastoreConfig {
                backend: DatastoreBackend::Http,
                reader: ServiceEndpoint::new("datastore-reader", 9010, "/internal/datastore/reader"),
                writer: ServiceEndpoint::new("datastore-writer", 9011, "/internal/datastore/writer"),
                initial_data: None,
                request_timeout_secs: 5,
            },
            action: ActionConfig {
                max_retries: 3,
                retry_backoff_ms: 50,
            },
            security: SecurityConfig {
                enable_cors: false,
                token_secret: String::new(),
                allow_guest: false,
                token_expiry_hours: 4,
            },
            logging: LoggingConfig { debug: false },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.component, Component::All);
        assert_eq!(config.server.worker_timeout(), Duration::from_secs(30));
        assert_eq!(config.datastore.backend, DatastoreBackend::Memory);
        assert_eq!(config.action.max_retries, 3);
        assert!(config.security.allow_guest);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.datastore.backend, DatastoreBackend::Http);
        assert!(!config.security.enable_cors);
        assert!(!config.logging.debug);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::production().with_overrides(lookup(&[
            ("BACKEND_COMPONENT", "presenter"),
            ("BACKEND_WORKER_TIMEOUT", "5"),
            ("DATASTORE_BACKEND", "memory"),
            ("ACTION_MAX_RETRIES", "not-a-number"),
            ("ACTION_RETRY_BACKOFF_MS", "10"),
            ("BACKEND_DEBUG", "1"),
        ]));
        assert_eq!(config.server.component, Component::Presenter);
        assert_eq!(config.server.worker_timeout_secs, 5);
        assert_eq!(config.datastore.backend, DatastoreBackend::Memory);
        assert_eq!(config.action.max_retries, 3);
        assert_eq!(config.action.retry_backoff_ms, 10);
        assert!(config.logging.debug);
    }

    #[test]
    fn test_datastore_endpoints() {
        let config = AppConfig::development().with_overrides(lookup(&[
            ("DATASTORE_READER_PROTOCOL", "https"),
            ("DATASTORE_READER_HOST", "reader"),
            ("DATASTORE_READER_PORT", "9999"),
            ("DATASTORE_WRITER_PATH", "/writer"),
        ]));
        assert_eq!(
            config.datastore.reader.url("reader").unwrap().as_str(),
            "https://reader:9999/internal/datastore/reader"
        );
        assert_eq!(
            config.datastore.writer.url("writer").unwrap().as_str(),
            "http://localhost:9011/writer"
        );
    }

    #[test]
    fn test_component_parse() {
        assert_eq!("ALL".parse::<Component>().unwrap(), Component::All);
        assert!("worker".parse::<Component>().is_err());
    }
}
