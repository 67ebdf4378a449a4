//! # secretbus-core
//!
//! Shared building blocks for the secretbus client crates:
//!
//! - **Configuration**: Loading, validation, and environment overrides
//! - **Secrets**: The zeroizing [`SecretValue`] payload type
//! - **Utilities**: Path resolution and environment handling

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretValue;
