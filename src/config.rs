//! Configuration management for BIFROST.
//!
//! All settings come from the process environment so the forwarder can be
//! dropped into a container or cron job without a config file. Every key
//! has a default except the API endpoint, credentials, and the trap
//! receiver address.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Bound on the node-list fetch. The API either answers quickly or the
/// run is not worth continuing.
pub const FETCH_TIMEOUT_SECS: u64 = 5;

/// Minimum interval between successive trap sends.
pub const SEND_INTERVAL_MS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub trap: TrapConfig,
    pub logging: LoggingConfig,
}

/// Upstream monitoring API (HTTP Basic auth).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TrapConfig {
    /// Trap receiver host (IP or resolvable name).
    pub receiver: String,
    pub receiver_port: u16,
    pub community: String,
    /// Enterprise trap root OID; per-field sub-OIDs hang off it.
    pub enterprise_oid: String,
    /// sysLocation fallback when a node carries no location.
    pub default_location: String,
    /// Upper bound on one trap send, resolution included. The receiver
    /// never answers a trap, so this only guards against a wedged socket
    /// or resolver.
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub console_output: bool,
    pub error_log: PathBuf,
    pub execution_log: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                url: String::new(),
                username: String::new(),
                password: String::new(),
            },
            trap: TrapConfig {
                receiver: String::new(),
                receiver_port: 1162,
                community: "public".to_string(),
                enterprise_oid: "1.3.6.1.4.1.11307.10".to_string(),
                default_location: "unknown".to_string(),
                send_timeout_ms: 2000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                console_output: true,
                error_log: PathBuf::from("bifrost_errors.log"),
                execution_log: PathBuf::from("bifrost_execution.log"),
            },
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Split out from
    /// [`Config::from_env`] so tests never have to mutate process-wide
    /// environment state.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let receiver_port = match get("TRAP_RECEIVER_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid TRAP_RECEIVER_PORT: {}", raw))?,
            None => defaults.trap.receiver_port,
        };

        let send_timeout_ms = match get("TRAP_SEND_TIMEOUT_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid TRAP_SEND_TIMEOUT_MS: {}", raw))?,
            None => defaults.trap.send_timeout_ms,
        };

        let console_output = match get("CONSOLE_LOG") {
            Some(raw) => matches!(raw.as_str(), "1" | "true" | "yes" | "on"),
            None => defaults.logging.console_output,
        };

        Ok(Self {
            api: ApiConfig {
                url: get("API_URL").unwrap_or_default(),
                username: get("API_USER").unwrap_or_default(),
                password: get("API_PASS").unwrap_or_default(),
            },
            trap: TrapConfig {
                receiver: get("TRAP_RECEIVER_IP").unwrap_or_default(),
                receiver_port,
                community: get("SNMP_COMMUNITY").unwrap_or(defaults.trap.community),
                enterprise_oid: get("ENTERPRISE_TRAP_OID").unwrap_or(defaults.trap.enterprise_oid),
                default_location: get("DEFAULT_LOCATION")
                    .unwrap_or(defaults.trap.default_location),
                send_timeout_ms,
            },
            logging: LoggingConfig {
                level: get("LOG_LEVEL").unwrap_or(defaults.logging.level),
                console_output,
                error_log: get("ERROR_LOG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.logging.error_log),
                execution_log: get("EXECUTION_LOG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.logging.execution_log),
            },
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api.url.is_empty() {
            anyhow::bail!("API_URL must be configured");
        }
        if !self.api.url.starts_with("http://") && !self.api.url.starts_with("https://") {
            anyhow::bail!("Invalid API_URL: {}", self.api.url);
        }
        if self.trap.receiver.is_empty() {
            anyhow::bail!("TRAP_RECEIVER_IP must be configured");
        }
        if self.trap.receiver_port == 0 {
            anyhow::bail!("Invalid trap receiver port: {}", self.trap.receiver_port);
        }
        if self.trap.community.is_empty() {
            anyhow::bail!("SNMP community string cannot be empty");
        }
        if self.trap.send_timeout_ms == 0 {
            anyhow::bail!("TRAP_SEND_TIMEOUT_MS must be greater than zero");
        }
        self.trap
            .enterprise_oid
            .parse::<crate::snmp::Oid>()
            .with_context(|| format!("Invalid ENTERPRISE_TRAP_OID: {}", self.trap.enterprise_oid))?;
        Ok(())
    }
}
