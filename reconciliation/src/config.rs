//! Configuration for reconciliation sources

use serde::{Deserialize, Serialize};

/// Reconciliation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Valuation feed configuration
    pub valuation: ValuationConfig,

    /// Banking-terminal feed configuration
    pub terminal: TerminalConfig,
}

/// Valuation feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Valuation service endpoint
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:97/service1.asmx/reparto_get_valores".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Banking-terminal feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Terminal service base endpoint
    pub endpoint: String,

    /// Basic-auth user
    pub user: String,

    /// Basic-auth password
    pub password: String,

    /// Terminal identifiers to poll
    pub terminals: Vec<String>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost/wcf/PIMSWS.svc/api/v3".to_string(),
            user: String::new(),
            password: String::new(),
            terminals: vec![
                "L-EJU-001".to_string(),
                "L-EJU-002".to_string(),
                "L-EJU-003".to_string(),
                "L-EJU-004".to_string(),
            ],
            timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(endpoint) = std::env::var("VALUATION_ENDPOINT") {
            config.valuation.endpoint = endpoint;
        }

        if let Ok(endpoint) = std::env::var("TERMINAL_ENDPOINT") {
            config.terminal.endpoint = endpoint;
        }

        if let Ok(user) = std::env::var("TERMINAL_USER") {
            config.terminal.user = user;
        }

        if let Ok(password) = std::env::var("TERMINAL_PASSWORD") {
            config.terminal.password = password;
        }

        if let Ok(terminals) = std::env::var("TERMINAL_IDS") {
            config.terminal.terminals = terminals.split(',').map(str::to_string).collect();
        }

        Ok(config)
    }
}
