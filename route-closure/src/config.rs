//! Configuration for closure dispatch

use crate::dispatcher::DispatchMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Closure dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureConfig {
    /// Legacy closure endpoint
    pub endpoint: String,

    /// Legacy service namespace (prefixes the action header)
    pub namespace: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Production sends over the wire; simulation synthesizes the reply.
    /// Explicit configuration, overridable per call, never a process
    /// global.
    pub mode: DispatchMode,

    /// Root directory for per-day audit artifacts
    pub audit_dir: PathBuf,

    /// Fixed system username sent in every envelope
    pub system_user: String,

    /// Terminal identifier → plant name, for batch reporting
    pub plants: HashMap<String, String>,

    /// Queue processing configuration
    pub queue: QueueConfig,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        let plants = [
            ("L-EJU-001", "jumillano"),
            ("L-EJU-002", "jumillano"),
            ("L-EJU-003", "plata"),
            ("L-EJU-004", "nafa"),
        ]
        .into_iter()
        .map(|(terminal, plant)| (terminal.to_string(), plant.to_string()))
        .collect();

        Self {
            endpoint: "http://localhost/Service1.asmx".to_string(),
            namespace: "http://legacy.example.com/".to_string(),
            timeout_seconds: 30,
            mode: DispatchMode::Simulation,
            audit_dir: PathBuf::from("./data/closure/audit"),
            system_user: "SISTEMA".to_string(),
            plants,
            queue: QueueConfig::default(),
        }
    }
}

/// Queue processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Dispatch attempts per deposit before it counts as failed
    pub max_retries: u32,

    /// Delay between attempts on the same deposit, in milliseconds
    pub retry_delay_ms: u64,

    /// Pacing delay between distinct deposits, in milliseconds.
    /// A deliberate throughput ceiling for the legacy endpoint.
    pub pacing_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            pacing_delay_ms: 1000,
        }
    }
}

impl ClosureConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClosureConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = ClosureConfig::default();

        if let Ok(endpoint) = std::env::var("CLOSURE_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(namespace) = std::env::var("CLOSURE_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(mode) = std::env::var("CLOSURE_MODE") {
            config.mode = mode
                .parse()
                .map_err(|_| crate::Error::Config(format!("Unknown dispatch mode: {}", mode)))?;
        }

        if let Ok(dir) = std::env::var("CLOSURE_AUDIT_DIR") {
            config.audit_dir = PathBuf::from(dir);
        }

        if let Ok(user) = std::env::var("CLOSURE_SYSTEM_USER") {
            config.system_user = user;
        }

        Ok(config)
    }
}
