//! Identity types: observed entities, attribute paths and registration tokens.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an observed entity.
///
/// Subscriptions hold entities weakly, so the id is what remains for
/// diagnostics once an entity has been released.
///
/// # Examples
///
/// ```
/// use attrwatch::EntityId;
///
/// let id = EntityId::new();
/// assert_ne!(id, EntityId::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Name of the attribute being watched on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(String);

impl AttributePath {
    /// Wraps a path string. Emptiness is checked when subscribing.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[must_use]
    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    /// True for the empty path, which no subscription accepts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributePath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for AttributePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&AttributePath> for AttributePath {
    fn from(path: &AttributePath) -> Self {
        path.clone()
    }
}

impl AsRef<str> for AttributePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AttributePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for AttributePath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AttributePath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Identity of one registration with a host.
///
/// Two subscriptions on the same entity and attribute always carry
/// different tokens, which is what scopes a delivery to its registrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationToken(Uuid);

impl RegistrationToken {
    /// Create a new random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_entity_id_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
    }

    #[test]
    fn test_entity_id_serde_transparent() {
        let uuid = Uuid::new_v4();
        let id = EntityId::from(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_attribute_path_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(AttributePath::from("name"), 1);
        assert_eq!(map.get("name"), Some(&1));
        assert_eq!(AttributePath::from("name"), "name");
    }

    #[test]
    fn test_attribute_path_empty() {
        assert!(AttributePath::new("").is_empty());
        assert!(!AttributePath::new("name").is_empty());
    }

    #[test]
    fn test_registration_tokens_distinct() {
        let a = RegistrationToken::new();
        let b = RegistrationToken::new();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
