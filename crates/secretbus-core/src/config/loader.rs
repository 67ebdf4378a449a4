//! Configuration loading and persistence.

use super::Config;
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded secretbus config");
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // JSON is valid JSON5.
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.service.bus_name.trim().is_empty() {
            errors.push("Service bus_name must not be empty".to_string());
        }

        if !self.service.object_path.starts_with('/') {
            errors.push(format!(
                "Service object_path '{}' must start with '/'",
                self.service.object_path
            ));
        }

        if self.session.algorithms.is_empty() {
            errors.push("At least one session algorithm must be configured".to_string());
        }
        for (i, algorithm) in self.session.algorithms.iter().enumerate() {
            if algorithm.trim().is_empty() {
                errors.push(format!("Session algorithm [{}] must not be empty", i));
            }
        }

        if self.collection.default_alias.is_empty() || self.collection.default_alias.contains('/') {
            errors.push(format!(
                "Invalid default collection alias '{}'",
                self.collection.default_alias
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Apply environment variable overrides on top of this configuration.
    pub fn apply_env(mut self) -> Self {
        if let Some(name) = env::get_var(env::vars::SECRETBUS_SERVICE_NAME) {
            self.service.bus_name = name;
        }

        if let Some(algorithms) = env::get_list(env::vars::SECRETBUS_ALGORITHMS) {
            self.session.algorithms = algorithms;
        }

        if let Some(window) = env::get_var(env::vars::SECRETBUS_PROMPT_WINDOW) {
            self.prompt.window_id = window;
        }

        self
    }

    /// Load configuration from the default path, falling back to defaults if no
    /// file exists, then apply environment overrides.
    pub fn load_or_default() -> Self {
        let config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring unreadable secretbus config: {e}");
                Self::default()
            }
        };
        config.apply_env()
    }
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service bus name.
    pub fn bus_name(mut self, name: impl Into<String>) -> Self {
        self.config.service.bus_name = name.into();
        self
    }

    /// Replace the algorithm preference list.
    pub fn algorithms<I, S>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.session.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Set the prompt window identifier.
    pub fn window_id(mut self, window_id: impl Into<String>) -> Self {
        self.config.prompt.window_id = window_id.into();
        self
    }

    /// Set the default collection alias.
    pub fn default_alias(mut self, alias: impl Into<String>) -> Self {
        self.config.collection.default_alias = alias.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}
