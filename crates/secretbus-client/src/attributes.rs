//! Typed attributes and schemas.
//!
//! Attributes travel over the bus as a string-to-string dictionary. Locally
//! they are typed, and a [`Schema`] says which names exist and what type each
//! one has. Validation happens before anything is sent.

use std::collections::BTreeMap;
use std::fmt;

use crate::bus::{BusError, Value};
use crate::error::{Result, SecretError};

/// Declared type of a schema attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Integer,
    Boolean,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl AttributeValue {
    /// Type of this value.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Integer(_) => AttributeType::Integer,
            AttributeValue::Boolean(_) => AttributeType::Boolean,
        }
    }

    /// Wire form of this value.
    pub fn to_wire(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Integer(n) => n.to_string(),
            AttributeValue::Boolean(b) => b.to_string(),
        }
    }

    /// Parse a wire string as the given type.
    pub fn parse(raw: &str, ty: AttributeType) -> Option<Self> {
        match ty {
            AttributeType::String => Some(AttributeValue::String(raw.to_string())),
            AttributeType::Integer => raw.parse().ok().map(AttributeValue::Integer),
            AttributeType::Boolean => match raw {
                "true" => Some(AttributeValue::Boolean(true)),
                "false" => Some(AttributeValue::Boolean(false)),
                _ => None,
            },
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Integer(n)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        AttributeValue::Integer(n.into())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }
}

/// An ordered set of typed attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.get(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether every attribute in `criteria` is present here with an equal
    /// value. Attributes not named in `criteria` are ignored.
    pub fn matches(&self, criteria: &Attributes) -> bool {
        criteria
            .iter()
            .all(|(name, value)| self.get(name).map(AttributeValue::to_wire) == Some(value.to_wire()))
    }

    /// Marshal to the `a{ss}` wire dictionary.
    pub fn to_wire(&self) -> Value {
        Value::Dict(
            self.entries
                .iter()
                .map(|(k, v)| (Value::Str(k.clone()), Value::Str(v.to_wire())))
                .collect(),
        )
    }

    /// Unmarshal from the wire, typing values with `schema` where it names
    /// them. Everything else stays a string.
    pub fn from_wire(value: Value, schema: Option<&Schema>) -> std::result::Result<Self, BusError> {
        let mut attributes = Attributes::new();
        for (name, raw) in value.into_string_dict()? {
            let typed = schema
                .and_then(|s| s.attribute_type(&name))
                .and_then(|ty| AttributeValue::parse(&raw, ty))
                .unwrap_or(AttributeValue::String(raw));
            attributes.entries.insert(name, typed);
        }
        Ok(attributes)
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (k, v) in iter {
            attributes.insert(k, v);
        }
        attributes
    }
}

/// A named declaration of attribute names and their types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    attributes: Vec<(String, AttributeType)>,
}

impl Schema {
    /// Create a schema.
    pub fn new<I, S>(name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeType)>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// Schema name, e.g. `org.example.Password`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type of an attribute.
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Check that every supplied attribute is declared with a matching type.
    pub fn validate(&self, attributes: &Attributes) -> Result<()> {
        for (name, value) in attributes.iter() {
            match self.attribute_type(name) {
                None => {
                    return Err(SecretError::Usage(format!(
                        "attribute '{}' is not declared by schema '{}'",
                        name, self.name
                    )))
                }
                Some(ty) if ty != value.attribute_type() => {
                    return Err(SecretError::Usage(format!(
                        "attribute '{}' of schema '{}' must be {}, got {}",
                        name,
                        self.name,
                        ty,
                        value.attribute_type()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
