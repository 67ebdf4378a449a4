//! Path resolution utilities.

use crate::env;
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the secretbus configuration directory (`<config dir>/secretbus`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let config = dirs::config_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine configuration directory".to_string())
    })?;
    Ok(config.join("secretbus"))
}

/// Get the config file path, honouring `SECRETBUS_CONFIG`.
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(env::vars::SECRETBUS_CONFIG) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("secretbus.json5"))
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
