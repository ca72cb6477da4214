pub mod config;
pub mod manager;

pub use config::{
    BusConfig, Config, ConfigError, ConfigResult, ErrorPolicy, ExternalAccess, LogLevel,
    LoggingConfig,
};
pub use manager::ConfigManager;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "courier.json";
