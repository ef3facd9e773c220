//! Configuration loading traits and types.
//!
//! TOML configuration shared by the hexgui binaries. Every section has
//! defaults, so a missing file or a partial file is fine; values are range
//! checked by [`HexguiConfig::validate`].
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "hexgui-m2"
//!
//! [connection]
//! host = "10.0.0.5"
//! port = 5560
//! timeout_connection = 10.0
//!
//! [command]
//! timeout = 5.0
//!
//! [telemetry]
//! nominal_rate_hz = 20.0
//! stale_timeout = 2.0
//!
//! [limits]
//! pivot_x = 500000.0
//! pivot_y = 500000.0
//! pivot_z = 3500000.0
//! strut_travel = 14100.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_TELEMETRY_STALE_TIMEOUT, MAX_ACTUATOR_RANGE_MIC, MAX_PIVOT_X_MIC, MAX_PIVOT_Y_MIC,
    MAX_PIVOT_Z_MIC, MAX_TIMEOUT, TELEMETRY_RATE_HZ,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::ParseError(format!("unknown log level '{other}'"))),
        }
    }
}

/// Common fields embedded in every application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "hexgui".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Application Config ─────────────────────────────────────────────

/// Controller link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout [s].
    #[serde(default = "default_timeout_connection")]
    pub timeout_connection: f64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_timeout_connection() -> f64 {
    DEFAULT_CONNECTION_TIMEOUT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_connection: default_timeout_connection(),
        }
    }
}

impl ConnectionConfig {
    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_connection)
    }
}

/// Command acknowledgement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Time allowed for acknowledgement plus telemetry confirmation [s].
    #[serde(default = "default_command_timeout")]
    pub timeout: f64,
}

fn default_command_timeout() -> f64 {
    DEFAULT_COMMAND_TIMEOUT
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout: default_command_timeout(),
        }
    }
}

impl CommandConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        seconds(self.timeout)
    }
}

/// Telemetry monitoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Expected telemetry rate [Hz], for late-frame detection.
    #[serde(default = "default_rate")]
    pub nominal_rate_hz: f64,

    /// No telemetry for this long counts as connection loss [s].
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout: f64,
}

fn default_rate() -> f64 {
    TELEMETRY_RATE_HZ
}
fn default_stale_timeout() -> f64 {
    DEFAULT_TELEMETRY_STALE_TIMEOUT
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            nominal_rate_hz: default_rate(),
            stale_timeout: default_stale_timeout(),
        }
    }
}

impl TelemetryConfig {
    /// Nominal inter-frame period [s].
    #[inline]
    pub fn nominal_period(&self) -> f64 {
        1.0 / self.nominal_rate_hz
    }

    #[inline]
    pub fn stale_timeout(&self) -> Duration {
        seconds(self.stale_timeout)
    }
}

/// Local range checks applied before transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum |x| of the pivot [µm].
    #[serde(default = "default_pivot_x")]
    pub pivot_x: f64,
    /// Maximum |y| of the pivot [µm].
    #[serde(default = "default_pivot_y")]
    pub pivot_y: f64,
    /// Maximum |z| of the pivot [µm].
    #[serde(default = "default_pivot_z")]
    pub pivot_z: f64,
    /// Normal strut travel: maximum |position| [µm].
    #[serde(default = "default_strut_travel")]
    pub strut_travel: f64,
}

fn default_pivot_x() -> f64 {
    MAX_PIVOT_X_MIC
}
fn default_pivot_y() -> f64 {
    MAX_PIVOT_Y_MIC
}
fn default_pivot_z() -> f64 {
    MAX_PIVOT_Z_MIC
}
fn default_strut_travel() -> f64 {
    MAX_ACTUATOR_RANGE_MIC
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            pivot_x: default_pivot_x(),
            pivot_y: default_pivot_y(),
            pivot_z: default_pivot_z(),
            strut_travel: default_strut_travel(),
        }
    }
}

/// Top-level hexgui configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HexguiConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl HexguiConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// `ParseError` for malformed TOML, `ValidationError` for values out of
    /// range.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::FileNotFound) => {
                tracing::info!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.connection.host.is_empty() {
            return Err(invalid("connection.host cannot be empty".to_string()));
        }
        if self.connection.port == 0 {
            return Err(invalid("connection.port cannot be 0".to_string()));
        }
        timeout("connection.timeout_connection", self.connection.timeout_connection)?;
        timeout("command.timeout", self.command.timeout)?;
        positive("telemetry.nominal_rate_hz", self.telemetry.nominal_rate_hz)?;
        timeout("telemetry.stale_timeout", self.telemetry.stale_timeout)?;
        if self.telemetry.stale_timeout <= self.telemetry.nominal_period() {
            return Err(invalid(format!(
                "telemetry.stale_timeout {} must exceed the nominal period {}",
                self.telemetry.stale_timeout,
                self.telemetry.nominal_period()
            )));
        }
        positive("limits.pivot_x", self.limits.pivot_x)?;
        positive("limits.pivot_y", self.limits.pivot_y)?;
        positive("limits.pivot_z", self.limits.pivot_z)?;
        positive("limits.strut_travel", self.limits.strut_travel)?;
        Ok(())
    }

    /// Return a copy with `overrides` applied.
    pub fn with_overrides(mut self, overrides: &SettingsOverride) -> Self {
        overrides.apply(&mut self);
        self
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

fn timeout(name: &str, value: f64) -> Result<(), ConfigError> {
    positive(name, value)?;
    if value > MAX_TIMEOUT {
        return Err(invalid(format!(
            "{name} must not exceed {MAX_TIMEOUT} s, got {value}"
        )));
    }
    Ok(())
}

/// Duration of a timeout field; values outside `(0, MAX_TIMEOUT]` are
/// clamped, `validate()` reports them.
fn seconds(value: f64) -> Duration {
    if value.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(value.clamp(0.0, MAX_TIMEOUT))
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

/// In-app or command-line settings that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverride {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_connection: Option<f64>,
    pub command_timeout: Option<f64>,
    pub log_level: Option<LogLevel>,
}

impl SettingsOverride {
    pub fn apply(&self, config: &mut HexguiConfig) {
        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if let Some(timeout) = self.timeout_connection {
            config.connection.timeout_connection = timeout;
        }
        if let Some(timeout) = self.command_timeout {
            config.command.timeout = timeout;
        }
        if let Some(level) = self.log_level {
            config.shared.log_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed: TestWrapper = toml::from_str(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, level);
            assert_eq!(level.as_str(), text);
        }
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = HexguiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.address(), "127.0.0.1:5560");
        assert_eq!(config.command.timeout(), Duration::from_secs(5));
        assert!((config.telemetry.nominal_period() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = HexguiConfig::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = HexguiConfig::load_or_default(Path::new("/nonexistent/hexgui.toml")).unwrap();
        assert_eq!(config.connection.port, DEFAULT_PORT);
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = HexguiConfig::load_or_default(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[connection]
host = "10.0.0.5"

[command]
timeout = 2.5
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = HexguiConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.connection.host, "10.0.0.5");
        assert_eq!(config.connection.port, DEFAULT_PORT);
        assert_eq!(config.command.timeout, 2.5);
        assert_eq!(config.shared.service_name, "hexgui");
        assert_eq!(config.limits, LimitsConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = HexguiConfig::default();
        config.command.timeout = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = HexguiConfig::default();
        config.telemetry.stale_timeout = 0.01;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = HexguiConfig::default();
        config.connection.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_huge_timeouts() {
        let mut config = HexguiConfig::default();
        config.command.timeout = 1e20;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        assert_eq!(config.command.timeout(), Duration::from_secs_f64(MAX_TIMEOUT));

        let mut config = HexguiConfig::default();
        config.connection.timeout_connection = f64::INFINITY;
        assert!(config.validate().is_err());
        assert_eq!(config.connection.timeout(), Duration::from_secs_f64(MAX_TIMEOUT));

        let mut config = HexguiConfig::default();
        config.telemetry.stale_timeout = MAX_TIMEOUT * 2.0;
        assert!(config.validate().is_err());

        let mut config = HexguiConfig::default();
        config.command.timeout = MAX_TIMEOUT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = SettingsOverride {
            host: Some("hexapod.local".to_string()),
            port: Some(6000),
            log_level: Some(LogLevel::Debug),
            ..Default::default()
        };
        let config = HexguiConfig::default().with_overrides(&overrides);
        assert_eq!(config.connection.host, "hexapod.local");
        assert_eq!(config.connection.port, 6000);
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.connection.timeout_connection, DEFAULT_CONNECTION_TIMEOUT);
    }
}
