//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get a comma-separated list, trimming entries and dropping empty ones.
///
/// `None` when the variable is unset or holds no entries.
pub fn get_list(name: &str) -> Option<Vec<String>> {
    let list: Vec<String> = get_var(name)?
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect();
    (!list.is_empty()).then_some(list)
}

/// Environment variables read by secretbus.
pub mod vars {
    /// Config file override.
    pub const SECRETBUS_CONFIG: &str = "SECRETBUS_CONFIG";

    /// Well-known bus name of the service.
    pub const SECRETBUS_SERVICE_NAME: &str = "SECRETBUS_SERVICE_NAME";

    /// Comma-separated algorithm preference list.
    pub const SECRETBUS_ALGORITHMS: &str = "SECRETBUS_ALGORITHMS";

    /// Prompt parent window identifier.
    pub const SECRETBUS_PROMPT_WINDOW: &str = "SECRETBUS_PROMPT_WINDOW";

    /// Log filter used by test harnesses and embedding applications.
    pub const SECRETBUS_LOG: &str = "SECRETBUS_LOG";
}
