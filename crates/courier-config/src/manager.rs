use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// File-backed configuration holder
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// Loads the config file, writing a default one if it does not exist.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            Self::read(path).await?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self {
            path: path.to_path_buf(),
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Wraps an in-memory config (tests, embedded defaults).
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// Snapshot of the current config.
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    pub async fn save(&self) -> ConfigResult<()> {
        self.save_to(&self.path).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    pub async fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config = self.config.read().await;
        let content = serde_json::to_string_pretty(&*config)?;
        drop(config);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Re-reads the file. The in-memory config is untouched if the new one
    /// does not validate.
    pub async fn reload(&self) -> ConfigResult<()> {
        if !self.path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                self.path
            )));
        }

        let new_config = Self::read(&self.path).await?;

        let mut config = self.config.write().await;
        *config = new_config;
        drop(config);

        info!("Config reloaded from {:?}", self.path);
        Ok(())
    }

    /// Applies `f`, validates, and persists.
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.config.write().await;
        let mut updated = config.clone();
        f(&mut updated);
        Self::validate(&updated)?;
        *config = updated;
        drop(config);
        self.save().await
    }

    pub fn validate(config: &Config) -> ConfigResult<()> {
        let name = config.bus.name.as_str();
        if name.is_empty() {
            return Err(ConfigError::Validation("Bus name cannot be empty".to_string()));
        }
        if name == "*" {
            return Err(ConfigError::Validation(
                "Bus name cannot be the wildcard '*'".to_string(),
            ));
        }
        if name.contains(':') || name.contains('/') {
            return Err(ConfigError::Validation(format!(
                "Bus name '{}' cannot contain ':' or '/'",
                name
            )));
        }

        let target = config.bus.target.as_str();
        if target.is_empty() || target.contains(':') || target.contains('/') {
            return Err(ConfigError::Validation(format!(
                "Invalid default target '{}'",
                target
            )));
        }

        if let crate::config::ExternalAccess::Paths(paths) = &config.bus.external {
            if paths.iter().any(|p| p.is_empty()) {
                return Err(ConfigError::Validation(
                    "External path patterns cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn read(path: &Path) -> ConfigResult<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::expand_env_vars(&content)?;
        let config: Config = serde_json::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Expands `${VAR}` and `${VAR:-default}`.
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let var_expr = var_expr.as_str();

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        Ok(result)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ErrorPolicy, ExternalAccess};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_writes_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("courier.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;

        assert!(config_path.exists());
        assert_eq!(config.bus.name, "background");
        assert_eq!(config.bus.target, "*");
    }

    #[tokio::test]
    async fn test_load_existing_with_env_expansion() {
        std::env::set_var("COURIER_TEST_BUS_NAME", "popup");

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("courier.json");
        let content = r#"{
            "bus": {
                "name": "${COURIER_TEST_BUS_NAME}",
                "target": "${COURIER_TEST_UNSET_TARGET:-background}",
                "on_error": "reject",
                "external": ["public/*"]
            }
        }"#;
        tokio::fs::write(&config_path, content).await.unwrap();

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;
        assert_eq!(config.bus.name, "popup");
        assert_eq!(config.bus.target, "background");
        assert_eq!(config.bus.on_error, ErrorPolicy::Reject);
        assert_eq!(
            config.bus.external,
            ExternalAccess::Paths(vec!["public/*".to_string()])
        );
    }

    #[tokio::test]
    async fn test_missing_env_var_is_an_error() {
        let content = r#"{"bus": {"name": "${COURIER_TEST_DEFINITELY_UNSET}"}}"#;
        let err = ConfigManager::expand_env_vars(content).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(ConfigManager::validate(&config).is_ok());

        config.bus.name = "*".to_string();
        assert!(ConfigManager::validate(&config).is_err());

        config.bus.name = "tab:1".to_string();
        assert!(ConfigManager::validate(&config).is_err());

        config.bus.name = "content".to_string();
        config.bus.target = "a/b".to_string();
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_and_keeps_old() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("courier.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        let result = manager.update(|c| c.bus.name = String::new()).await;
        assert!(result.is_err());
        assert_eq!(manager.snapshot().await.bus.name, "background");

        manager.update(|c| c.bus.target = "popup".to_string()).await.unwrap();
        manager.reload().await.unwrap();
        assert_eq!(manager.snapshot().await.bus.target, "popup");
    }
}
