//! Configuration resolution for `GatePass`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`~/.config/gatepass/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binaries)
//!
//! The payload signing secret is deliberately absent: binaries take it from
//! `--signing-secret` / `GATEPASS_SIGNING_SECRET` and hand it straight to the
//! signer.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete `GatePass` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Payload freshness policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// How long a signed payload stays valid. Default: 24 hours.
    pub validity_secs: u64,
    /// Tolerated forward clock skew for freshly issued payloads.
    pub clock_skew_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            validity_secs: 24 * 60 * 60,
            clock_skew_secs: 5,
        }
    }
}

impl VerifierConfig {
    pub const fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_secs)
    }

    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }
}

/// Storage location and per-operation time bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
    /// Upper bound for a single storage read/write during verification.
    pub timeout_ms: u64,
    /// How long a decision may wait for its access-log write.
    pub log_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            timeout_ms: 3_000,
            log_timeout_ms: 1_500,
        }
    }
}

impl StorageConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub const fn log_timeout(&self) -> Duration {
        Duration::from_millis(self.log_timeout_ms)
    }
}

/// Scanning-station settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Identical decodes inside this window are dropped.
    pub debounce_ms: u64,
    /// Shorter decodes are never forwarded.
    pub min_payload_len: usize,
    pub server_url: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 3_000,
            min_payload_len: 24,
            server_url: "http://127.0.0.1:8470".to_string(),
        }
    }
}

impl ScannerConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8470)),
            log_json: false,
        }
    }
}

impl Config {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.verifier.validity_secs == 0 {
            return Err(Error::Config("verifier.validity_secs must be > 0".into()));
        }
        if self.verifier.clock_skew_secs >= self.verifier.validity_secs {
            return Err(Error::Config(
                "verifier.clock_skew_secs must be smaller than validity_secs".into(),
            ));
        }
        if self.storage.timeout_ms == 0 {
            return Err(Error::Config("storage.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        config = load_config_file(&global_path)?;
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".gatepass").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/gatepass/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("gatepass").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Default location of the server database when none is configured.
pub fn default_database_path() -> Option<PathBuf> {
    global_config_path().and_then(|p| p.parent().map(|dir| dir.join("gatepass.db")))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(n) = var("GATEPASS_VALIDITY_SECS").and_then(|v| v.parse().ok()) {
        config.verifier.validity_secs = n;
    }
    if let Some(n) = var("GATEPASS_CLOCK_SKEW_SECS").and_then(|v| v.parse().ok()) {
        config.verifier.clock_skew_secs = n;
    }
    if let Some(n) = var("GATEPASS_STORAGE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.storage.timeout_ms = n;
    }
    if let Some(path) = var("GATEPASS_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(path));
    }
    if let Some(n) = var("GATEPASS_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
        config.scanner.debounce_ms = n;
    }
    if let Some(url) = var("GATEPASS_SERVER_URL") {
        config.scanner.server_url = url;
    }
}
