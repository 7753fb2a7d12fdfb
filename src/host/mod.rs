//! Host object model boundary.
//!
//! Subscriptions never talk to a concrete object model directly; they go
//! through the [`Observable`] and [`ChangeHandler`] traits defined here.

mod memory;
mod traits;

pub use memory::ObservableObject;
pub use traits::{ChangeHandler, ChangeInfo, Observable, ObservationOptions};
