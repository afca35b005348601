//! Normalized upstream listing record.
//!
//! A [`ListingRecord`] is what every source adapter hands to the engine: an
//! origin-unique identifier plus the raw upstream attributes. Mappers read the
//! attributes they need through the typed accessors below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One upstream offer as seen in a single polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Identifier, unique within its origin.
    pub identifier: String,
    /// Raw upstream attributes (a JSON object).
    pub attributes: Value,
}

impl ListingRecord {
    /// Create a record from an identifier and its attributes.
    pub fn new(identifier: impl Into<String>, attributes: Value) -> Self {
        Self {
            identifier: identifier.into(),
            attributes,
        }
    }

    /// Build a record from an upstream offer object, reading the identifier
    /// from its `id` field.
    ///
    /// Numeric and string ids are both accepted.
    pub fn from_offer(offer: Value) -> Result<Self> {
        let identifier = offer
            .get("id")
            .and_then(scalar_to_string)
            .ok_or(Error::MissingField("id"))?;

        if identifier.is_empty() {
            return Err(Error::InvalidField {
                field: "id",
                reason: "empty identifier".to_string(),
            });
        }

        Ok(Self::new(identifier, offer))
    }

    /// Look up an attribute by dotted path (`trader.login`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.attributes, |value, key| value.get(key))
            .filter(|v| !v.is_null())
    }

    /// Required attribute rendered as a string.
    pub fn require_str(&self, path: &'static str) -> Result<String> {
        self.get(path)
            .ok_or(Error::MissingField(path))
            .and_then(|v| {
                scalar_to_string(v).ok_or_else(|| Error::InvalidField {
                    field: path,
                    reason: format!("expected a scalar, got {}", v),
                })
            })
    }

    /// Optional attribute rendered as a string.
    pub fn str_or(&self, path: &str, default: &str) -> String {
        self.get(path)
            .and_then(scalar_to_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Optional attribute kept as a raw JSON value, `default` when absent.
    pub fn value_or(&self, path: &str, default: Value) -> Value {
        self.get(path).cloned().unwrap_or(default)
    }
}

/// Render a JSON scalar the way upstream APIs print it.
///
/// Strings are returned verbatim, numbers and booleans via their JSON text.
/// Arrays, objects and null yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
