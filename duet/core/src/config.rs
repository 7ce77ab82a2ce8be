//! TOML Configuration File Support
//!
//! Loads `~/.config/duet/duet.toml` and layers environment and CLI overrides
//! on top.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`DUET_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/duet/duet.toml` (typically `~/.config/duet/duet.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! bind_address = "0.0.0.0"
//! connect_timeout_ms = 5000
//! max_line_bytes = 65536
//! nodelay = true
//!
//! [game]
//! difficulty = "hard"
//! room_prefix = "sudoku-room"
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discovery::DEFAULT_ROOM_PREFIX;
use crate::game::Difficulty;
use crate::transport::config::{
    TransportConfig, ENV_BIND_ADDR, ENV_CONNECT_TIMEOUT, ENV_MAX_LINE_BYTES, ENV_NODELAY,
    MIN_MAX_LINE_BYTES,
};

/// Env var: default puzzle difficulty
pub const ENV_DIFFICULTY: &str = "DUET_DIFFICULTY";
/// Env var: room name prefix
pub const ENV_ROOM_PREFIX: &str = "DUET_ROOM_PREFIX";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration last got a value from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[transport]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Address the host listens on
    pub bind_address: Option<IpAddr>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Maximum record length in bytes
    pub max_line_bytes: Option<usize>,

    /// Whether to set `TCP_NODELAY`
    pub nodelay: Option<bool>,
}

/// `[game]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameToml {
    /// Difficulty the host generates when none is given
    pub difficulty: Option<Difficulty>,

    /// Prefix for advertised room names
    pub room_prefix: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuetToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// Game configuration section
    pub game: GameToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
///
/// Use [`load_config`] to build one with proper priority handling.
#[derive(Clone, Debug)]
pub struct DuetConfig {
    /// Transport configuration
    pub transport: TransportConfig,

    /// Default puzzle difficulty
    pub difficulty: Difficulty,

    /// Prefix for generated room names
    pub room_prefix: String,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for DuetConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            difficulty: Difficulty::default(),
            room_prefix: DEFAULT_ROOM_PREFIX.to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl DuetConfig {
    /// Configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Reject values the transport cannot work with
    ///
    /// # Errors
    ///
    /// [`ConfigError::ValidationError`] naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.transport.max_line_bytes < MIN_MAX_LINE_BYTES {
            return Err(ConfigError::ValidationError(format!(
                "max_line_bytes must be at least {MIN_MAX_LINE_BYTES}, got {}",
                self.transport.max_line_bytes
            )));
        }
        if self.room_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "room_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default configuration file path
///
/// `$XDG_CONFIG_HOME/duet/duet.toml`, or `~/.config/duet/duet.toml` if
/// `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("duet").join("duet.toml"))
}

/// Load configuration from the default path, environment and defaults
///
/// CLI overrides are applied afterwards by the caller.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or if the merged result fails validation. A missing file is not an error.
pub fn load_config() -> Result<DuetConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<DuetConfig, ConfigError> {
    load_config_with_env(path.as_deref(), |key| std::env::var(key).ok())
}

/// Load configuration with an injectable environment lookup
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<DuetConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = DuetConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: DuetToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;
    Ok(config)
}

fn apply_toml_config(config: &mut DuetConfig, toml: &DuetToml) {
    if let Some(addr) = toml.transport.bind_address {
        config.transport.bind_address = addr;
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }
    if let Some(limit) = toml.transport.max_line_bytes {
        config.transport.max_line_bytes = limit;
    }
    if let Some(nodelay) = toml.transport.nodelay {
        config.transport.nodelay = nodelay;
    }

    if let Some(difficulty) = toml.game.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(ref prefix) = toml.game.room_prefix {
        config.room_prefix = prefix.clone();
    }
}

fn apply_env_config<F>(config: &mut DuetConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = env(ENV_BIND_ADDR).and_then(|v| v.parse().ok()) {
        config.transport.bind_address = addr;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env(ENV_CONNECT_TIMEOUT).and_then(|v| v.parse().ok()) {
        config.transport.connect_timeout_ms = ms;
        config.source = ConfigSource::Env;
    }
    if let Some(limit) = env(ENV_MAX_LINE_BYTES).and_then(|v| v.parse().ok()) {
        config.transport.max_line_bytes = limit;
        config.source = ConfigSource::Env;
    }
    if let Some(nodelay) = env(ENV_NODELAY) {
        config.transport.nodelay = nodelay != "0" && nodelay.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(difficulty) = env(ENV_DIFFICULTY).and_then(|v| v.parse().ok()) {
        config.difficulty = difficulty;
        config.source = ConfigSource::Env;
    }
    if let Some(prefix) = env(ENV_ROOM_PREFIX) {
        config.room_prefix = prefix;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Bind address override
    pub bind_address: Option<IpAddr>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Difficulty override
    pub difficulty: Option<Difficulty>,
}

impl ConfigOverrides {
    /// Empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bind address override
    #[must_use]
    pub fn with_bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set difficulty override
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Apply overrides and re-validate
    ///
    /// # Errors
    ///
    /// [`ConfigError::ValidationError`] if an override is out of range.
    pub fn apply(&self, config: &mut DuetConfig) -> Result<(), ConfigError> {
        if self.bind_address.is_some()
            || self.connect_timeout_ms.is_some()
            || self.difficulty.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(addr) = self.bind_address {
            config.transport.bind_address = addr;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.transport.connect_timeout_ms = timeout;
        }
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
