//! Typed values exchanged with the bus.

use std::fmt;

use crate::bus::BusError;

/// An object path on the bus. `/` stands for "no object".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Create an object path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The `/` path used by the protocol to mean "nothing".
    pub fn none() -> Self {
        Self("/".to_string())
    }

    /// Whether this is the `/` placeholder.
    pub fn is_none(&self) -> bool {
        self.0 == "/"
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ObjectPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ObjectPath> for ObjectPath {
    fn from(p: &ObjectPath) -> Self {
        p.clone()
    }
}

/// A bus value. Covers the types the secret service protocol uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    U32(u32),
    U64(u64),
    Str(String),
    Path(ObjectPath),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    Variant(Box<Value>),
}

impl Value {
    /// Wrap a value in a variant.
    pub fn variant(inner: Value) -> Self {
        Value::Variant(Box::new(inner))
    }

    /// Build an `ao` array from paths.
    pub fn path_array<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a ObjectPath>,
    {
        Value::Array(paths.into_iter().cloned().map(Value::Path).collect())
    }

    /// Strip any variant wrapping.
    pub fn into_inner(self) -> Value {
        match self {
            Value::Variant(inner) => inner.into_inner(),
            other => other,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "b",
            Value::I32(_) => "i",
            Value::U32(_) => "u",
            Value::U64(_) => "t",
            Value::Str(_) => "s",
            Value::Path(_) => "o",
            Value::Bytes(_) => "ay",
            Value::Array(_) => "a",
            Value::Dict(_) => "a{}",
            Value::Struct(_) => "()",
            Value::Variant(_) => "v",
        }
    }

    fn mismatch(&self, expected: &str) -> BusError {
        BusError::Malformed(format!("expected '{}', got '{}'", expected, self.kind()))
    }

    /// Extract a boolean.
    pub fn into_bool(self) -> Result<bool, BusError> {
        match self.into_inner() {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch("b")),
        }
    }

    /// Extract a string.
    pub fn into_string(self) -> Result<String, BusError> {
        match self.into_inner() {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("s")),
        }
    }

    /// Extract an unsigned 64-bit integer, widening smaller unsigned types.
    pub fn into_u64(self) -> Result<u64, BusError> {
        match self.into_inner() {
            Value::U64(n) => Ok(n),
            Value::U32(n) => Ok(n.into()),
            other => Err(other.mismatch("t")),
        }
    }

    /// Extract an object path.
    pub fn into_path(self) -> Result<ObjectPath, BusError> {
        match self.into_inner() {
            Value::Path(p) => Ok(p),
            other => Err(other.mismatch("o")),
        }
    }

    /// Extract a byte array.
    pub fn into_bytes(self) -> Result<Vec<u8>, BusError> {
        match self.into_inner() {
            Value::Bytes(b) => Ok(b),
            other => Err(other.mismatch("ay")),
        }
    }

    /// Extract an array of object paths.
    pub fn into_paths(self) -> Result<Vec<ObjectPath>, BusError> {
        match self.into_inner() {
            Value::Array(items) => items.into_iter().map(Value::into_path).collect(),
            other => Err(other.mismatch("ao")),
        }
    }

    /// Extract the fields of a struct.
    pub fn into_struct(self) -> Result<Vec<Value>, BusError> {
        match self.into_inner() {
            Value::Struct(fields) => Ok(fields),
            other => Err(other.mismatch("()")),
        }
    }

    /// Extract dictionary entries.
    pub fn into_dict(self) -> Result<Vec<(Value, Value)>, BusError> {
        match self.into_inner() {
            Value::Dict(entries) => Ok(entries),
            other => Err(other.mismatch("a{}")),
        }
    }

    /// Extract an `a{ss}` dictionary.
    pub fn into_string_dict(self) -> Result<Vec<(String, String)>, BusError> {
        self.into_dict()?
            .into_iter()
            .map(|(k, v)| Ok((k.into_string()?, v.into_string()?)))
            .collect()
    }

    /// Extract an `a{sv}` dictionary, leaving values wrapped as they came.
    pub fn into_property_dict(self) -> Result<Vec<(String, Value)>, BusError> {
        self.into_dict()?
            .into_iter()
            .map(|(k, v)| Ok((k.into_string()?, v)))
            .collect()
    }
}

/// Pop exactly `N` values from a reply body.
pub fn take_args<const N: usize>(body: Vec<Value>) -> Result<[Value; N], BusError> {
    let len = body.len();
    body.try_into()
        .map_err(|_| BusError::Malformed(format!("expected {} reply values, got {}", N, len)))
}
