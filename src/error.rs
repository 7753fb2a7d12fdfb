//! Error types for attrwatch.
//!
//! All errors are strongly typed using thiserror. Construction-time
//! precondition failures are returned to the caller; delivery-time
//! failures stay local to the subscription and are logged.

use thiserror::Error;

use crate::entity::{AttributePath, EntityId};

/// Errors raised by subscriptions, groups and hosts.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum WatchError {
    #[error("Entity {entity_id} was released before '{path}' could be read")]
    StaleReference {
        entity_id: EntityId,
        path: AttributePath,
    },

    #[error("Notification for '{actual}' arrived on a registration for '{expected}'")]
    MismatchedPath {
        expected: AttributePath,
        actual: AttributePath,
    },

    #[error("Attribute path cannot be empty")]
    EmptyPath,

    #[error("A group needs at least one member subscription")]
    EmptyGroup,

    #[error("Callback of subscription to '{path}' is owned by its group")]
    CallbackOwnedByGroup {
        path: AttributePath,
    },

    #[error("Subscription to '{path}' has been invalidated")]
    Invalidated {
        path: AttributePath,
    },

    #[error("Entity {entity_id} refused registration for '{path}': {reason}")]
    Registration {
        entity_id: EntityId,
        path: AttributePath,
        reason: String,
    },

    #[error("Cannot decode {actual} value as {expected}: {reason}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
        reason: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Change stream disconnected")]
    Disconnected,
}

impl WatchError {
    /// Returns true if the error was caused by a released entity.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleReference { .. })
    }

    /// Returns true if the error indicates a broken internal invariant
    /// rather than misuse or an environmental condition.
    #[must_use]
    pub const fn is_programming_error(&self) -> bool {
        matches!(self, Self::MismatchedPath { .. })
    }

    /// Returns true if the error is a violated construction precondition.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::EmptyPath
                | Self::EmptyGroup
                | Self::CallbackOwnedByGroup { .. }
                | Self::Invalidated { .. }
        )
    }
}

/// Result type alias for attrwatch operations.
pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_reference_message() {
        let id = EntityId::new();
        let err = WatchError::StaleReference {
            entity_id: id,
            path: AttributePath::from("name"),
        };
        let msg = format!("{err}");
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("'name'"));
        assert!(err.is_stale());
        assert!(!err.is_programming_error());
    }

    #[test]
    fn test_mismatched_path_is_programming_error() {
        let err = WatchError::MismatchedPath {
            expected: AttributePath::from("name"),
            actual: AttributePath::from("age"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("'age'"));
        assert!(msg.contains("'name'"));
        assert!(err.is_programming_error());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_precondition_errors() {
        assert!(WatchError::EmptyGroup.is_precondition());
        assert!(WatchError::EmptyPath.is_precondition());
        assert!(WatchError::CallbackOwnedByGroup {
            path: AttributePath::from("name"),
        }
        .is_precondition());
        assert!(!WatchError::Disconnected.is_precondition());
    }

    #[test]
    fn test_timeout_message() {
        let err = WatchError::Timeout { duration_ms: 250 };
        assert!(format!("{err}").contains("250ms"));
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = WatchError::TypeMismatch {
            expected: "i64",
            actual: "string",
            reason: "invalid type".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("string"));
        assert!(msg.contains("i64"));
    }
}
