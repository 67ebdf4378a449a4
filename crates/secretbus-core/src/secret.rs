//! Secret payload handling with memory protection.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Content type used when none is supplied.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// A secret payload: exact bytes plus their content type.
///
/// The bytes are owned exclusively by this value and are zeroed when it is
/// dropped. The length is always the payload length, never derived from a
/// terminator, so embedded zero bytes survive.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    bytes: Vec<u8>,
    content_type: String,
}

impl SecretValue {
    /// Create a new secret from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Create a `text/plain` secret.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(value.into().into_bytes(), DEFAULT_CONTENT_TYPE)
    }

    /// Expose the secret bytes. The slice length is the secret length.
    pub fn get(&self) -> &[u8] {
        &self.bytes
    }

    /// Expose the secret as text, if it is valid UTF-8.
    ///
    /// Covers the same bytes as [`get`](Self::get); no terminator is involved.
    pub fn get_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content type of the secret, e.g. `text/plain`.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

// Never print secrets
impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        // Use constant-time comparison for security
        self.content_type == other.content_type && constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for SecretValue {}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
