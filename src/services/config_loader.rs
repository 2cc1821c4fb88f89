// markd Config Loader
// Loads AppConfig from a JSON file, then applies environment overrides.
// A missing file yields defaults; a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::config::{AppConfig, ClientSecret};
use crate::types::errors::ConfigError;

pub const ENV_DATA_DIR: &str = "MARKD_DATA_DIR";
pub const ENV_CONFIG: &str = "MARKD_CONFIG";
pub const ENV_CLIENT_ID: &str = "MARKD_OAUTH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "MARKD_OAUTH_CLIENT_SECRET";
pub const ENV_LOG: &str = "MARKD_LOG";

/// Reads and writes `config.json`.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Uses `path_override` when given, else `$MARKD_CONFIG`, else
    /// `config.json` in `$MARKD_DATA_DIR` (or the working directory).
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path = path_override
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                let dir = std::env::var(ENV_DATA_DIR).unwrap_or_else(|_| ".".to_string());
                PathBuf::from(dir).join("config.json")
            });
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the file (or defaults) and applies environment overrides.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        validate(&config)?;
        Ok(config)
    }

    /// Loads the file only. If the file does not exist, returns defaults.
    pub fn load_file(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_path.exists() {
            tracing::info!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to parse config file: {}", e))
        })
    }

    /// Writes `config` to the config file, creating parent directories.
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(&self.config_path, json)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))
    }
}

/// Applies `MARKD_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_DATA_DIR) {
        config.storage.data_dir = dir;
    }
    if let Some(id) = lookup(ENV_CLIENT_ID) {
        config.oauth.client_id = id;
    }
    if let Some(secret) = lookup(ENV_CLIENT_SECRET) {
        config.oauth.client_secret = ClientSecret::new(secret);
    }
    if let Some(filter) = lookup(ENV_LOG) {
        config.logging.filter = filter;
    }
}

/// Rejects values that would only fail later and less clearly.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.storage.database_file.is_empty() {
        return Err(ConfigError::InvalidValue("storage.database_file is empty".to_string()));
    }
    if config.rpc.max_requests_per_second == 0 {
        return Err(ConfigError::InvalidValue(
            "rpc.max_requests_per_second must be positive".to_string(),
        ));
    }
    if config.oauth.state_ttl_secs <= 0 {
        return Err(ConfigError::InvalidValue("oauth.state_ttl_secs must be positive".to_string()));
    }
    Ok(())
}

/// Full path of the SQLite database file.
pub fn database_path(config: &AppConfig) -> PathBuf {
    PathBuf::from(&config.storage.data_dir).join(&config.storage.database_file)
}
