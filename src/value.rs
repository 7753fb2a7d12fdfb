//! Attribute values carried by change notifications.
//!
//! An attribute that is unset is represented as `Option::None` at every
//! boundary (old value of an initial trigger, null markers in a group
//! snapshot), so `Value` itself has no null variant.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{WatchError, WatchResult};

/// A value stored under an attribute path.
///
/// # Examples
///
/// ```
/// use attrwatch::Value;
///
/// let name = Value::from("Daniel");
/// assert_eq!(name.as_str(), Some("Daniel"));
/// assert_eq!(name.decode::<String>().unwrap(), "Daniel");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Entity(EntityId),
    List(Vec<Value>),
    Structured(serde_json::Value),
}

impl Value {
    /// The string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Entity(_) => "entity",
            Self::List(_) => "list",
            Self::Structured(_) => "structured",
        }
    }

    /// Plain JSON form of the value, without the serde type tag.
    ///
    /// Non-finite floats have no JSON representation and map to `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::Entity(v) => serde_json::Value::String(v.to_string()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Structured(v) => v.clone(),
        }
    }

    /// Decode the value into a concrete Rust type.
    ///
    /// # Errors
    /// `TypeMismatch` if the value's JSON form does not deserialize as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> WatchResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| WatchError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            actual: self.type_name(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Entity(v) => write!(f, "entity:{v}"),
            Self::List(v) => write!(f, "list[{}]", v.len()),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self {
        Self::Entity(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}
