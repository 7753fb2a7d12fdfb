//! Attribute subscriptions.
//!
//! A [`Subscription`] watches one attribute of one entity. A
//! [`GroupSubscription`] takes ownership of several subscriptions and turns
//! their individual notifications into one snapshot callback. Both follow the
//! same two-state lifecycle: they start Active and become Invalidated either
//! explicitly or when dropped. Invalidated is terminal.

use std::sync::atomic::{AtomicU8, Ordering};

/// Convenience constructors.
pub mod facade;
/// Group subscriptions and snapshots.
pub mod group;
/// Single attribute subscriptions.
pub mod single;
/// Channel adapter for single subscriptions.
pub mod stream;

pub use facade::{combine, combine_with_config, observe, observe_attribute, observe_typed};
pub use group::{GroupCallback, GroupSubscription, Snapshot};
pub use single::{Callback, Subscription};
pub use stream::{observe_channel, ChangeEvent, ChangeStream};

/// Lifecycle state shared by both subscription kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered and delivering.
    Active,
    /// Unregistered; never delivers again.
    Invalidated,
}

/// Operations available on any subscription, single or grouped.
pub trait Observation: Send + Sync {
    /// Stop observing. Idempotent; also runs on drop.
    fn invalidate(&self);

    /// True until the subscription has been invalidated.
    fn is_active(&self) -> bool;
}

const ACTIVE: u8 = 0;
const INVALIDATED: u8 = 1;

/// Atomic Active → Invalidated transition.
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(ACTIVE))
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        match self.0.load(Ordering::Acquire) {
            ACTIVE => SubscriptionState::Active,
            _ => SubscriptionState::Invalidated,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Returns true for the one call that performed the transition.
    pub(crate) fn invalidate(&self) -> bool {
        self.0
            .compare_exchange(ACTIVE, INVALIDATED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_lifecycle_transition_happens_once() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.is_active());
        assert!(lifecycle.invalidate());
        assert!(!lifecycle.invalidate());
        assert_eq!(lifecycle.state(), SubscriptionState::Invalidated);
    }

    #[test]
    fn test_lifecycle_concurrent_invalidate_single_winner() {
        let lifecycle = Arc::new(Lifecycle::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                std::thread::spawn(move || lifecycle.invalidate())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
