/**
 * Server Configuration
 *
 * Loads `AppConfig` in three layers:
 *
 * 1. built-in defaults
 * 2. an optional TOML file: `$ITEMTRAIL_CONFIG`, else
 *    `<config dir>/itemtrail/config.toml`
 * 3. environment variables (`EVENT_STORE_API_KEY`, `SERVER_PORT`, ...)
 *
 * # Error Handling
 *
 * Configuration errors are logged but do not prevent server startup. A file
 * that cannot be parsed is skipped as a whole; an unparseable environment
 * value keeps the previous layer's value.
 */

use std::path::{Path, PathBuf};

use crate::shared::config::{AppConfig, ConfigError};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "ITEMTRAIL_CONFIG";

/// Default location of the config file, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("itemtrail").join("config.toml"))
}

/// Load configuration from the process environment
pub fn load_config() -> AppConfig {
    let path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .or_else(default_config_path);
    load_config_from(path.as_deref(), |key| std::env::var(key).ok())
}

/// Load configuration from `path` (if it exists) and `lookup`
pub fn load_config_from<F>(path: Option<&Path>, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) if path.exists() => match read_file(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration file");
                config
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Ignoring unreadable configuration file");
                AppConfig::default()
            }
        },
        _ => AppConfig::default(),
    };

    for problem in config.apply_env(lookup) {
        tracing::warn!(error = %problem, "Ignoring environment override");
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid event store host, falling back to the default");
        config.telemetry.host = AppConfig::default().telemetry.host;
    }

    config
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    AppConfig::from_toml_str(&raw)
}
