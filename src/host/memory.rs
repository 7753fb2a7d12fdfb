//! In-memory observable entity.
//!
//! Thread-safe reference implementation of [`Observable`]. It is intended for
//! embedded usage and tests, and documents the behavior expected from hosts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::entity::{AttributePath, EntityId, RegistrationToken};
use crate::error::{WatchError, WatchResult};
use crate::host::traits::{ChangeHandler, ChangeInfo, Observable, ObservationOptions};
use crate::lock;
use crate::value::Value;

#[derive(Clone)]
struct Registration {
    options: ObservationOptions,
    handler: Arc<dyn ChangeHandler>,
}

/// An entity holding named attribute values that notifies registered
/// handlers on every mutation.
///
/// Mutations notify even when the new value equals the old one.
pub struct ObservableObject {
    id: EntityId,
    values: RwLock<HashMap<AttributePath, Value>>,
    observers: RwLock<HashMap<AttributePath, Vec<Registration>>>,
}

impl ObservableObject {
    /// Creates an entity with no attributes.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_attributes(std::iter::empty::<(&str, Value)>())
    }

    /// Creates an entity seeded with attribute values.
    ///
    /// # Examples
    ///
    /// ```
    /// use attrwatch::{ObservableObject, Value};
    ///
    /// let person = ObservableObject::with_attributes([("name", "Daniel")]);
    /// assert_eq!(person.get("name"), Some(Value::from("Daniel")));
    /// ```
    pub fn with_attributes<P, V>(attributes: impl IntoIterator<Item = (P, V)>) -> Arc<Self>
    where
        P: Into<AttributePath>,
        V: Into<Value>,
    {
        let values = attributes
            .into_iter()
            .map(|(path, value)| (path.into(), value.into()))
            .collect();
        Arc::new(Self {
            id: EntityId::new(),
            values: RwLock::new(values),
            observers: RwLock::new(HashMap::new()),
        })
    }

    /// Id of this entity.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Current value of `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        lock::read(&self.values).get(path).cloned()
    }

    /// Set `path` to `value`, notifying observers. Returns the previous value.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Option<Value> {
        self.store(path, Some(value.into()))
    }

    /// Unset `path`, notifying observers. Returns the previous value.
    pub fn remove(&self, path: &str) -> Option<Value> {
        self.store(path, None)
    }

    /// Names of all attributes currently set, sorted.
    #[must_use]
    pub fn attributes(&self) -> Vec<AttributePath> {
        let mut names: Vec<AttributePath> = lock::read(&self.values).keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of handlers registered for `path`.
    #[must_use]
    pub fn observer_count(&self, path: &str) -> usize {
        lock::read(&self.observers).get(path).map_or(0, Vec::len)
    }

    fn store(&self, path: &str, new: Option<Value>) -> Option<Value> {
        let old = {
            let mut values = lock::write(&self.values);
            match &new {
                Some(value) => values.insert(AttributePath::from(path), value.clone()),
                None => values.remove(path),
            }
        };

        // Handlers run with no lock held so they can re-enter this entity.
        let targets: Vec<Registration> = lock::read(&self.observers)
            .get(path)
            .cloned()
            .unwrap_or_default();

        trace!(entity_id = %self.id, path, observers = targets.len(), "attribute changed");

        for reg in &targets {
            let change = ChangeInfo {
                old: old.clone(),
                new: new.clone(),
                initial: false,
            }
            .filtered(reg.options);
            reg.handler.deliver(path, &change, reg.handler.token());
        }

        old
    }
}

impl std::fmt::Debug for ObservableObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableObject")
            .field("id", &self.id)
            .field("attributes", &self.attributes())
            .finish_non_exhaustive()
    }
}

impl Observable for ObservableObject {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn register(
        &self,
        path: &str,
        options: ObservationOptions,
        handler: Arc<dyn ChangeHandler>,
    ) -> WatchResult<()> {
        let token = handler.token();
        {
            let mut observers = lock::write(&self.observers);
            let slot = observers.entry(AttributePath::from(path)).or_default();
            if slot.iter().any(|r| r.handler.token() == token) {
                return Err(WatchError::Registration {
                    entity_id: self.id,
                    path: AttributePath::from(path),
                    reason: format!("token {token} is already registered"),
                });
            }
            slot.push(Registration {
                options,
                handler: Arc::clone(&handler),
            });
        }

        if options.initial {
            let change = ChangeInfo::initial(self.get(path)).filtered(options);
            handler.deliver(path, &change, token);
        }

        Ok(())
    }

    fn unregister(&self, path: &str, token: RegistrationToken) {
        let mut observers = lock::write(&self.observers);
        if let Some(slot) = observers.get_mut(path) {
            slot.retain(|r| r.handler.token() != token);
            if slot.is_empty() {
                observers.remove(path);
            }
        }
    }

    fn read_value(&self, path: &str) -> Option<Value> {
        self.get(path)
    }
}
