//! Group subscription configuration.

use serde::{Deserialize, Serialize};

/// What a group recompute does when a member's entity has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleMemberPolicy {
    /// Report the member as `None` in both snapshot sequences and fire anyway.
    #[default]
    Placeholder,
    /// Skip the whole group callback for this recompute.
    Abort,
}

/// Configuration for a [`GroupSubscription`](crate::GroupSubscription).
///
/// # Examples
///
/// ```
/// use attrwatch::{GroupConfig, StaleMemberPolicy};
///
/// let cfg = GroupConfig::default().with_stale_member(StaleMemberPolicy::Abort);
/// assert_eq!(cfg.stale_member, StaleMemberPolicy::Abort);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Handling of members whose entity is gone at recompute time.
    pub stale_member: StaleMemberPolicy,
}

impl GroupConfig {
    /// Set the stale member policy.
    #[must_use]
    pub const fn with_stale_member(mut self, policy: StaleMemberPolicy) -> Self {
        self.stale_member = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_placeholder() {
        assert_eq!(GroupConfig::default().stale_member, StaleMemberPolicy::Placeholder);
    }

    #[test]
    fn test_deserialize_from_partial_json() {
        let cfg: GroupConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, GroupConfig::default());

        let cfg: GroupConfig = serde_json::from_str(r#"{"stale_member":"abort"}"#).unwrap();
        assert_eq!(cfg.stale_member, StaleMemberPolicy::Abort);
    }
}
