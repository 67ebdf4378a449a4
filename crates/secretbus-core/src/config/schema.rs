//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Well-known bus name of the secret storage service.
pub const DEFAULT_BUS_NAME: &str = "org.freedesktop.secrets";

/// Object path of the service object.
pub const DEFAULT_OBJECT_PATH: &str = "/org/freedesktop/secrets";

/// Transport algorithm that encrypts secrets with a DH-derived AES key.
pub const ALGORITHM_DH_AES: &str = "dh-ietf1024-sha256-aes128-cbc-pkcs7";

/// Transport algorithm that sends secrets unencrypted.
pub const ALGORITHM_PLAIN: &str = "plain";

/// Main secretbus configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote service addressing.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Transport session negotiation.
    #[serde(default)]
    pub session: SessionConfig,

    /// Confirmation prompt handling.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Collection defaults.
    #[serde(default)]
    pub collection: CollectionConfig,
}

/// Where the remote service lives on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Well-known bus name to resolve at service construction.
    #[serde(default = "default_bus_name")]
    pub bus_name: String,

    /// Object path of the service object.
    #[serde(default = "default_object_path")]
    pub object_path: String,
}

fn default_bus_name() -> String {
    DEFAULT_BUS_NAME.to_string()
}

fn default_object_path() -> String {
    DEFAULT_OBJECT_PATH.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bus_name: default_bus_name(),
            object_path: default_object_path(),
        }
    }
}

/// Session negotiation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Algorithms offered to the service, most preferred first.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,
}

fn default_algorithms() -> Vec<String> {
    vec![ALGORITHM_DH_AES.to_string(), ALGORITHM_PLAIN.to_string()]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
        }
    }
}

/// Prompt settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Platform window identifier passed to the service so its confirmation
    /// dialog can be parented. Empty means no parent.
    #[serde(default)]
    pub window_id: String,
}

/// Collection defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Alias used when storing without an explicit collection.
    #[serde(default = "default_alias")]
    pub default_alias: String,
}

fn default_alias() -> String {
    "default".to_string()
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            default_alias: default_alias(),
        }
    }
}

impl Config {
    /// Object path of the alias collection used by default for stores.
    pub fn default_collection_path(&self) -> String {
        format!(
            "{}/aliases/{}",
            self.service.object_path.trim_end_matches('/'),
            self.collection.default_alias
        )
    }
}
