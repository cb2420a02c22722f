//! Application configuration.
//!
//! Layered loading: an optional `config.yaml` under `BREWDISPATCH__*`
//! environment variables, with the legacy flat variables (`PORT`, `NETWORK`,
//! `TLS_BYPASS`) the gateway has always consumed overlaid last. Validation is
//! fail-fast: a missing required setting aborts startup before any listener
//! is bound.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "BREWDISPATCH";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "BREWDISPATCH_LOG";
/// Legacy environment variable for the HTTP listen port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Legacy environment variable for the backend network address.
pub const NETWORK_ENV_VAR: &str = "NETWORK";
/// Legacy environment variable for the plaintext-channel flag.
pub const TLS_BYPASS_ENV_VAR: &str = "TLS_BYPASS";

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required setting missing: {0}")]
    Missing(&'static str),

    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("TLS termination is not supported; set TLS_BYPASS to a truthy value")]
    TlsRequired,

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener configuration.
    pub http: HttpConfig,
    /// Backend catalog service configuration.
    pub backend: BackendConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on. Required.
    pub port: Option<u16>,
    /// Origins allowed to make cross-origin calls. A `"*"` entry allows any
    /// origin; the request's exact `Origin` value is reflected either way.
    pub allowed_origins: Vec<String>,
    /// Grace period for draining in-flight requests at shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
            allowed_origins: vec!["*".to_string()],
            shutdown_grace_secs: 30,
        }
    }
}

/// Backend catalog service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host, without port. Required.
    pub network: Option<String>,
    /// Backend gRPC port.
    pub port: u16,
    /// Plaintext-channel flag. Required, and must be truthy: the gateway
    /// dials the backend without TLS and refuses to start otherwise.
    pub tls_bypass: Option<String>,
    /// Per-request deadline for a streaming call, open through drain.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            network: None,
            port: 50051,
            tls_bypass: None,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Sources, later overrides earlier:
    /// 1. `config.yaml` in the current directory (if present)
    /// 2. Environment variables with the `BREWDISPATCH__` prefix
    /// 3. Legacy flat variables: `PORT`, `NETWORK`, `TLS_BYPASS`
    pub fn load() -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let settings = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;

        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            config.http.port = Some(port.parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV_VAR,
                value: port.clone(),
            })?);
        }
        if let Ok(network) = std::env::var(NETWORK_ENV_VAR) {
            config.backend.network = Some(network);
        }
        if let Ok(tls_bypass) = std::env::var(TLS_BYPASS_ENV_VAR) {
            config.backend.tls_bypass = Some(tls_bypass);
        }

        Ok(config)
    }

    /// Check that every required setting is present.
    ///
    /// The listen port, backend network address, and TLS-bypass flag have no
    /// defaults; any of them missing is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port.is_none() {
            return Err(ConfigError::Missing(PORT_ENV_VAR));
        }
        match self.backend.network.as_deref() {
            None | Some("") => return Err(ConfigError::Missing(NETWORK_ENV_VAR)),
            Some(_) => {}
        }
        match self.backend.tls_bypass.as_deref() {
            None | Some("") => Err(ConfigError::Missing(TLS_BYPASS_ENV_VAR)),
            Some(flag) if !is_truthy(flag) => Err(ConfigError::TlsRequired),
            Some(_) => Ok(()),
        }
    }

    /// Socket address string for the HTTP listener.
    pub fn listen_addr(&self) -> Result<String, ConfigError> {
        let port = self.http.port.ok_or(ConfigError::Missing(PORT_ENV_VAR))?;
        Ok(format!("{}:{}", self.http.host, port))
    }

    /// Backend address string, `host:port`.
    pub fn backend_addr(&self) -> Result<String, ConfigError> {
        let network = self
            .backend
            .network
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::Missing(NETWORK_ENV_VAR))?;
        Ok(format!("{}:{}", network, self.backend.port))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> Config {
        let mut config = Config::default();
        config.http.port = Some(8080);
        config.backend.network = Some("breweryctr".to_string());
        config.backend.tls_bypass = Some("true".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.allowed_origins, vec!["*"]);
        assert_eq!(config.http.shutdown_grace_secs, 30);
        assert_eq!(config.backend.port, 50051);
        assert_eq!(config.backend.request_timeout_secs, 10);
    }

    #[test]
    fn test_validate_complete() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_port() {
        let mut config = complete_config();
        config.http.port = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing(PORT_ENV_VAR))
        ));
    }

    #[test]
    fn test_validate_missing_network() {
        let mut config = complete_config();
        config.backend.network = Some(String::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing(NETWORK_ENV_VAR))
        ));
    }

    #[test]
    fn test_validate_missing_tls_bypass() {
        let mut config = complete_config();
        config.backend.tls_bypass = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing(TLS_BYPASS_ENV_VAR))
        ));
    }

    #[test]
    fn test_validate_falsy_tls_bypass() {
        let mut config = complete_config();
        config.backend.tls_bypass = Some("false".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::TlsRequired)));
    }

    #[test]
    fn test_addresses() {
        let config = complete_config();
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:8080");
        assert_eq!(config.backend_addr().unwrap(), "breweryctr:50051");
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            assert!(is_truthy(value), "{value} should be truthy");
        }
        for value in ["0", "false", "no", "off", "other"] {
            assert!(!is_truthy(value), "{value} should be falsy");
        }
    }
}
