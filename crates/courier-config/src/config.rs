use serde::{Deserialize, Serialize};

/// Top-level `courier.json` contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Reads a value by dotted key, e.g. `bus.target`.
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["bus", "name"] => Some(self.bus.name.clone()),
            ["bus", "target"] => Some(self.bus.target.clone()),
            ["bus", "on_error"] => Some(self.bus.on_error.as_str().to_string()),
            ["bus", "external"] => serde_json::to_string(&self.bus.external).ok(),
            ["logging", "level"] => Some(self.logging.level.as_str().to_string()),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// Sets a value by dotted key.
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["bus", "name"] => {
                self.bus.name = value.to_string();
            }
            ["bus", "target"] => {
                self.bus.target = value.to_string();
            }
            ["bus", "on_error"] => {
                self.bus.on_error = value.parse()?;
            }
            ["bus", "external"] => {
                self.bus.external = serde_json::from_str(value).map_err(|_| {
                    ConfigError::Validation(format!(
                        "Invalid external access (expected true, false or a list): {}",
                        value
                    ))
                })?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "json"] => {
                self.logging.json = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid boolean: {}", value))
                })?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

/// Bus identity and call behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusConfig {
    /// Name this bus answers to
    pub name: String,
    /// Default outbound target, `*` for broadcast
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// Calls accepted from other extensions
    #[serde(default)]
    pub external: ExternalAccess,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "background".to_string(),
            target: default_target(),
            on_error: ErrorPolicy::default(),
            external: ExternalAccess::default(),
        }
    }
}

/// Error policies expressible in a file. Custom resolvers are code-only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Warn,
    Silent,
    Reject,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Silent => "silent",
            Self::Reject => "reject",
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "silent" => Ok(Self::Silent),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigError::Validation(format!("Invalid error policy: {}", s))),
        }
    }
}

/// `false`/`true`, or a list of allowed path patterns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ExternalAccess {
    Enabled(bool),
    Paths(Vec<String>),
}

impl Default for ExternalAccess {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl ExternalAccess {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Enabled(enabled) => *enabled,
            Self::Paths(paths) => !paths.is_empty(),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
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
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_target() -> String {
    "*".to_string()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bus.name, "background");
        assert_eq!(config.bus.target, "*");
        assert_eq!(config.bus.on_error, ErrorPolicy::Warn);
        assert!(!config.bus.external.is_enabled());
    }

    #[test]
    fn test_external_access_forms() {
        let bus: BusConfig =
            serde_json::from_str(r#"{"name": "bg", "external": true}"#).unwrap();
        assert_eq!(bus.external, ExternalAccess::Enabled(true));

        let bus: BusConfig =
            serde_json::from_str(r#"{"name": "bg", "external": ["public/*", "ping"]}"#).unwrap();
        assert_eq!(
            bus.external,
            ExternalAccess::Paths(vec!["public/*".to_string(), "ping".to_string()])
        );
        assert_eq!(bus.target, "*");
    }

    #[test]
    fn test_get_set_value() {
        let mut config = Config::default();
        config.set_value("bus.target", "popup").unwrap();
        config.set_value("bus.on_error", "reject").unwrap();
        config.set_value("bus.external", r#"["api/*"]"#).unwrap();

        assert_eq!(config.get_value("bus.target").as_deref(), Some("popup"));
        assert_eq!(config.get_value("bus.on_error").as_deref(), Some("reject"));
        assert_eq!(config.get_value("bus.external").as_deref(), Some(r#"["api/*"]"#));
        assert!(config.set_value("bus.on_error", "explode").is_err());
        assert!(matches!(
            config.set_value("bus.unknown", "x"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }
}
