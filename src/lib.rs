//! # attrwatch - typed attribute observation with group subscriptions
//!
//! attrwatch lets code subscribe to changes of a named attribute on an
//! observed entity and receive the old and new values, without writing the
//! registration bookkeeping by hand. Several subscriptions can be merged into
//! one group that reports a combined snapshot whenever any member changes.
//!
//! ## Core Concepts
//!
//! - **Observable**: the host capability an entity implements to be watched
//! - **Subscription**: one (entity, attribute path) observation
//! - **GroupSubscription**: an ordered set of subscriptions reported as one
//! - **Snapshot**: the ordered entities and current values a group reports
//!
//! Delivery is synchronous, on whatever thread mutated the attribute.
//! Subscriptions hold entities weakly and unregister themselves when dropped.
//!
//! ## Usage
//!
//! ```rust
//! use attrwatch::{combine, observe, ObservableObject, Subscription};
//!
//! let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
//! let e2 = ObservableObject::with_attributes([("name", "Alana")]);
//!
//! // One attribute, one callback.
//! let single = observe(&e1, "name", true, |_, path, old, new| {
//!     println!("{path}: {old:?} -> {new:?}");
//! })?;
//! drop(single);
//!
//! // Many attributes, one callback.
//! let group = combine(
//!     vec![
//!         Subscription::new(&e1, "name", false)?,
//!         Subscription::new(&e2, "name", false)?,
//!     ],
//!     |snapshot| println!("{:?}", snapshot.values),
//! )?;
//! e2.set("name", "Lana");
//! # drop(group);
//! # Ok::<(), attrwatch::WatchError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod host;
pub mod observe;
pub mod value;

mod lock;

// Re-export primary types at crate root for convenience
pub use config::{GroupConfig, StaleMemberPolicy};
pub use entity::{AttributePath, EntityId, RegistrationToken};
pub use error::{WatchError, WatchResult};
pub use host::{ChangeHandler, ChangeInfo, Observable, ObservableObject, ObservationOptions};
pub use observe::{
    combine, combine_with_config, observe, observe_attribute, observe_channel, observe_typed,
    Callback, ChangeEvent, ChangeStream, GroupCallback, GroupSubscription, Observation, Snapshot,
    Subscription, SubscriptionState,
};
pub use value::Value;
