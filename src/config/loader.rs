//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery, environment
//! detection and layering of base file, environment overlay and env variables.

use super::error::{ConfigResult, ConfigurationError};
use super::DispatcherConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE: &str = "base.toml";
const ENV_PREFIX: &str = "DISPATCHER";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: DispatcherConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build_layers(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = environment,
            reclamation_enabled = config.reclamation.enabled,
            interval_seconds = config.reclamation.interval_seconds,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, mostly for tests and embedding
    pub fn from_config(config: DispatcherConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn build_layers(config_directory: &Path, environment: &str) -> ConfigResult<DispatcherConfig> {
        let base_path = config_directory.join(BASE_FILE);
        if !base_path.is_file() {
            return Err(ConfigurationError::config_file_not_found(vec![base_path]));
        }
        let overlay_path = config_directory.join(format!("{environment}.toml"));

        let builder = Config::builder()
            .add_source(File::from(base_path.clone()).required(true))
            .add_source(File::from(overlay_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())
            .map_err(|e| ConfigurationError::EnvironmentOverrideError {
                key: "DATABASE_URL".to_string(),
                reason: e.to_string(),
            })?;

        builder
            .build()
            .and_then(|built| built.try_deserialize::<DispatcherConfig>())
            .map_err(|e| ConfigurationError::build_error(base_path.display().to_string(), e))
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("DISPATCHER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("DISPATCHER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config").join("dispatcher"))
    }

    fn sanitize_config_for_logging(config: &DispatcherConfig) -> serde_json::Value {
        let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        if let Some(url) = value
            .get_mut("database")
            .and_then(|db| db.get_mut("url"))
        {
            if let Some(raw) = url.as_str() {
                *url = serde_json::Value::String(mask_database_url(raw));
            }
        }
        value
    }
}

/// Replace the password component of a connection url with `***`
fn mask_database_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end + 3],
            &credentials[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}
