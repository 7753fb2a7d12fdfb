//! Capability traits a host object model implements to be observable.
//!
//! Any object model that can notify synchronously when a named attribute
//! changes can back subscriptions by implementing [`Observable`]. The
//! crate's own [`ObservableObject`](super::ObservableObject) is the
//! in-memory reference implementation.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, RegistrationToken};
use crate::error::WatchResult;
use crate::value::Value;

/// Which parts of a change a registrant wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationOptions {
    /// Include the value before the change.
    pub old: bool,
    /// Include the value after the change.
    pub new: bool,
    /// Deliver one synthetic change during `register`, with no old value.
    pub initial: bool,
}

impl ObservationOptions {
    /// Old and new values, optionally with an initial trigger.
    #[must_use]
    pub const fn old_and_new(initial: bool) -> Self {
        Self {
            old: true,
            new: true,
            initial,
        }
    }
}

impl Default for ObservationOptions {
    fn default() -> Self {
        Self::old_and_new(true)
    }
}

/// One attribute change as seen by a registrant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// Value before the change; always `None` for an initial change.
    pub old: Option<Value>,
    /// Value after the change; `None` when the attribute was unset.
    pub new: Option<Value>,
    /// True for the synthetic change delivered at registration.
    pub initial: bool,
}

impl ChangeInfo {
    /// The synthetic change delivered when `initial` was requested.
    #[must_use]
    pub const fn initial(current: Option<Value>) -> Self {
        Self {
            old: None,
            new: current,
            initial: true,
        }
    }

    /// Restrict the change to the parts requested in `options`.
    #[must_use]
    pub fn filtered(mut self, options: ObservationOptions) -> Self {
        if !options.old {
            self.old = None;
        }
        if !options.new {
            self.new = None;
        }
        self
    }
}

/// Receiver side of a registration.
///
/// Hosts call [`deliver`](ChangeHandler::deliver) synchronously on the
/// thread that mutated the attribute, passing the token the handler was
/// registered under.
pub trait ChangeHandler: Send + Sync {
    /// Token identifying this handler's registration.
    fn token(&self) -> RegistrationToken;

    /// Handle one change notification.
    fn deliver(&self, path: &str, change: &ChangeInfo, token: RegistrationToken);
}

/// Host capability: an entity whose attributes can be observed.
///
/// # Contract
/// - Deliveries are synchronous and happen on the mutating thread.
/// - Hosts must not hold internal locks while calling
///   [`ChangeHandler::deliver`]; handlers may re-enter the host.
/// - `unregister` is idempotent.
pub trait Observable: Send + Sync {
    /// Stable identity of this entity.
    fn entity_id(&self) -> EntityId;

    /// Begin delivering changes of `path` to `handler`.
    ///
    /// With `options.initial`, the host delivers one [`ChangeInfo::initial`]
    /// change to `handler` before returning.
    ///
    /// # Errors
    /// `Registration` if the host refuses the registration.
    fn register(
        &self,
        path: &str,
        options: ObservationOptions,
        handler: std::sync::Arc<dyn ChangeHandler>,
    ) -> WatchResult<()>;

    /// Stop delivering changes of `path` to the handler registered under `token`.
    fn unregister(&self, path: &str, token: RegistrationToken);

    /// Current value of `path`, or `None` if unset.
    fn read_value(&self, path: &str) -> Option<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_change_has_no_old_value() {
        let change = ChangeInfo::initial(Some(Value::from("Daniel")));
        assert!(change.initial);
        assert!(change.old.is_none());
        assert_eq!(change.new, Some(Value::from("Daniel")));
    }

    #[test]
    fn test_filtered_drops_unrequested_parts() {
        let change = ChangeInfo {
            old: Some(Value::Int(1)),
            new: Some(Value::Int(2)),
            initial: false,
        };
        let options = ObservationOptions {
            old: false,
            new: true,
            initial: false,
        };
        let filtered = change.filtered(options);
        assert!(filtered.old.is_none());
        assert_eq!(filtered.new, Some(Value::Int(2)));
    }

    #[test]
    fn test_default_options_request_everything() {
        let options = ObservationOptions::default();
        assert!(options.old && options.new && options.initial);
        assert!(!ObservationOptions::old_and_new(false).initial);
    }
}
