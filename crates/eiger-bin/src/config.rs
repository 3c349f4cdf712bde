//! Layered configuration.
//!
//! Layers, each overriding the previous:
//! 1. Defaults from [`Settings::default()`]
//! 2. A TOML file (`--config`, else `eiger.toml` if present)
//! 3. Environment variables prefixed `EIGER_`, nested with `__`
//!    (e.g. `EIGER_CONNECTION__HOST=10.0.0.5`, `EIGER_SCAN__POLL_PERIOD_MS=500`)
//!
//! ```toml
//! log_level = "info"
//!
//! [connection]
//! host = "127.0.0.1"
//! port = 8080
//! timeout_ms = 2000
//! mock = false
//!
//! [scan]
//! poll_period_ms = 200
//!
//! [discovery]
//! rename_policy = "origin"
//! ```

use anyhow::{Context, Result};
use eiger_controller::{ControllerOptions, RenamePolicy};
use eiger_core::EigerError;
use eiger_http::{HttpSettings, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::{Figment, Provider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File read when no `--config` is given, if it exists.
pub const DEFAULT_CONFIG_PATH: &str = "eiger.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: String,
    /// Detector address
    pub connection: ConnectionSettings,
    /// Polling
    pub scan: ScanSettings,
    /// Discovery
    pub discovery: DiscoverySettings,
}

/// Where the detector is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Hostname or IP address
    pub host: String,
    /// SIMPLON HTTP port
    pub port: u16,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Talk to the built-in simulated detector instead of `host:port`
    pub mock: bool,
}

/// Polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Interval between polls of each attribute
    pub poll_period_ms: u64,
}

/// Discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// How colliding parameter names are made unique
    pub rename_policy: RenamePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            connection: ConnectionSettings::default(),
            scan: ScanSettings::default(),
            discovery: DiscoverySettings::default(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            mock: false,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_period_ms: eiger_controller::DEFAULT_POLL_PERIOD.as_millis() as u64,
        }
    }
}

impl Provider for Settings {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("Library Defaults")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(Settings::default()).data()
    }
}

impl Settings {
    /// Load defaults, then the TOML file, then `EIGER_*` variables, and
    /// validate the result.
    ///
    /// An explicit `path` must exist; the default path is skipped if missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Settings::default());

        match path {
            Some(path) => {
                anyhow::ensure!(
                    path.exists(),
                    "Config file not found: {}",
                    path.display()
                );
                figment = figment.merge(Toml::file(path));
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                figment = figment.merge(Toml::file(DEFAULT_CONFIG_PATH));
            }
            None => {}
        }

        let settings: Settings = figment
            .merge(Env::prefixed("EIGER_").split("__"))
            .extract()
            .context("Failed to extract configuration")?;

        settings
            .validate()
            .context("Configuration validation failed")?;

        Ok(settings)
    }

    /// Reject values nothing downstream can work with.
    pub fn validate(&self) -> Result<(), EigerError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(EigerError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.connection.host.trim().is_empty() {
            return Err(EigerError::Configuration(
                "connection.host cannot be empty".to_string(),
            ));
        }
        if self.connection.port == 0 {
            return Err(EigerError::Configuration(
                "connection.port cannot be 0".to_string(),
            ));
        }
        if self.connection.timeout_ms == 0 {
            return Err(EigerError::Configuration(
                "connection.timeout_ms must be positive".to_string(),
            ));
        }
        if self.scan.poll_period_ms == 0 {
            return Err(EigerError::Configuration(
                "scan.poll_period_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// HTTP transport settings.
    pub fn http(&self) -> HttpSettings {
        HttpSettings {
            host: self.connection.host.clone(),
            port: self.connection.port,
            timeout_ms: self.connection.timeout_ms,
        }
    }

    /// Controller tunables.
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            poll_period: Duration::from_millis(self.scan.poll_period_ms),
            rename_policy: self.discovery.rename_policy,
        }
    }
}
