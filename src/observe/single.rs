use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, error, trace};

use crate::entity::{AttributePath, EntityId, RegistrationToken};
use crate::error::{WatchError, WatchResult};
use crate::host::{ChangeHandler, ChangeInfo, Observable, ObservationOptions};
use crate::lock;
use crate::value::Value;

use super::group::GroupInner;
use super::{Lifecycle, Observation, SubscriptionState};

/// Callback of a single subscription: `(entity, path, old, new)`.
pub type Callback =
    Arc<dyn Fn(&Arc<dyn Observable>, &AttributePath, Option<&Value>, Option<&Value>) + Send + Sync>;

pub(crate) fn callback_fn<F>(f: F) -> Callback
where
    F: Fn(&Arc<dyn Observable>, &AttributePath, Option<&Value>, Option<&Value>)
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// State shared between a [`Subscription`] and the host it is registered with.
pub(crate) struct SubscriptionInner {
    token: RegistrationToken,
    entity_id: EntityId,
    path: AttributePath,
    trigger_initial: bool,
    entity: RwLock<Option<Weak<dyn Observable>>>,
    callback: RwLock<Option<Callback>>,
    lifecycle: Lifecycle,
    grouped: AtomicBool,
    group: RwLock<Option<Weak<GroupInner>>>,
}

impl SubscriptionInner {
    pub(crate) const fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub(crate) const fn path(&self) -> &AttributePath {
        &self.path
    }

    pub(crate) fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Live entity, or `None` once released or invalidated.
    pub(crate) fn resolve_entity(&self) -> Option<Arc<dyn Observable>> {
        lock::read(&self.entity).as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn replace_callback(&self, callback: Option<Callback>) {
        *lock::write(&self.callback) = callback;
    }

    pub(crate) fn mark_grouped(&self, group: Weak<GroupInner>) {
        *lock::write(&self.group) = Some(group);
        self.grouped.store(true, Ordering::Release);
    }

    fn owning_group(&self) -> Option<Arc<GroupInner>> {
        lock::read(&self.group).as_ref().and_then(Weak::upgrade)
    }

    fn callback(&self) -> Option<Callback> {
        lock::read(&self.callback).clone()
    }

    pub(crate) fn invalidate(&self) {
        if !self.lifecycle.invalidate() {
            return;
        }

        let entity = lock::write(&self.entity).take();
        if let Some(entity) = entity.as_ref().and_then(Weak::upgrade) {
            entity.unregister(self.path.as_str(), self.token);
        }
        self.replace_callback(None);

        debug!(
            entity_id = %self.entity_id,
            path = %self.path,
            token = %self.token,
            "subscription invalidated"
        );
    }
}

impl ChangeHandler for SubscriptionInner {
    fn token(&self) -> RegistrationToken {
        self.token
    }

    fn deliver(&self, path: &str, change: &ChangeInfo, token: RegistrationToken) {
        if token != self.token {
            trace!(
                expected = %self.token,
                actual = %token,
                path,
                "ignoring change for another registration"
            );
            return;
        }

        if !self.lifecycle.is_active() {
            return;
        }

        if self.path != path {
            let err = WatchError::MismatchedPath {
                expected: self.path.clone(),
                actual: AttributePath::from(path),
            };
            error!(
                entity_id = %self.entity_id,
                token = %self.token,
                error = %err,
                "dropping misrouted change"
            );
            return;
        }

        let Some(entity) = self.resolve_entity() else {
            trace!(entity_id = %self.entity_id, path, "entity released; change dropped");
            return;
        };

        let Some(callback) = self.callback() else {
            return;
        };

        trace!(entity_id = %self.entity_id, path, initial = change.initial, "delivering change");
        callback(&entity, &self.path, change.old.as_ref(), change.new.as_ref());
    }
}

/// A subscription to one attribute of one entity.
///
/// The entity is held weakly: the subscription never keeps it alive.
/// Dropping the subscription invalidates it, which unregisters it from the
/// entity.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use attrwatch::{observe, ObservableObject, Observation};
///
/// let person = ObservableObject::with_attributes([("name", "Daniel")]);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
///
/// let sub = observe(&person, "name", true, move |_, _, old, new| {
///     sink.lock().unwrap().push((old.cloned(), new.cloned()));
/// })?;
/// person.set("name", "Dan");
/// sub.invalidate();
/// person.set("name", "Bob");
///
/// assert_eq!(seen.lock().unwrap().len(), 2);
/// # Ok::<(), attrwatch::WatchError>(())
/// ```
pub struct Subscription {
    pub(crate) inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Subscribe without a callback. Used for members handed to a group.
    ///
    /// # Errors
    /// `EmptyPath` for an empty path, or the host's registration error.
    pub fn new<E>(
        entity: &Arc<E>,
        path: impl Into<AttributePath>,
        trigger_initial: bool,
    ) -> WatchResult<Self>
    where
        E: Observable + 'static,
    {
        let entity: Arc<dyn Observable> = Arc::clone(entity) as Arc<dyn Observable>;
        Self::attach(&entity, path.into(), trigger_initial, None)
    }

    /// Subscribe with a callback.
    ///
    /// With `trigger_initial`, `callback` runs once before this returns, with
    /// no old value and the entity's current value as new value.
    ///
    /// # Errors
    /// `EmptyPath` for an empty path, or the host's registration error.
    pub fn with_callback<E, F>(
        entity: &Arc<E>,
        path: impl Into<AttributePath>,
        trigger_initial: bool,
        callback: F,
    ) -> WatchResult<Self>
    where
        E: Observable + 'static,
        F: Fn(&Arc<dyn Observable>, &AttributePath, Option<&Value>, Option<&Value>)
            + Send
            + Sync
            + 'static,
    {
        let entity: Arc<dyn Observable> = Arc::clone(entity) as Arc<dyn Observable>;
        Self::attach(&entity, path.into(), trigger_initial, Some(callback_fn(callback)))
    }

    /// Subscribe to an entity already erased to `dyn Observable`, such as one
    /// taken from a [`Snapshot`](super::Snapshot).
    ///
    /// # Errors
    /// `EmptyPath` for an empty path, or the host's registration error.
    pub fn attach(
        entity: &Arc<dyn Observable>,
        path: AttributePath,
        trigger_initial: bool,
        callback: Option<Callback>,
    ) -> WatchResult<Self> {
        if path.is_empty() {
            return Err(WatchError::EmptyPath);
        }

        // Owned before registering: an error or an unwinding initial callback
        // drops it, and `Drop` unregisters.
        let subscription = Self {
            inner: Arc::new(SubscriptionInner {
                token: RegistrationToken::new(),
                entity_id: entity.entity_id(),
                path,
                trigger_initial,
                entity: RwLock::new(Some(Arc::downgrade(entity))),
                callback: RwLock::new(callback),
                lifecycle: Lifecycle::new(),
                grouped: AtomicBool::new(false),
                group: RwLock::new(None),
            }),
        };
        let inner = &subscription.inner;

        // The initial trigger, if requested, is delivered inside `register`.
        let handler: Arc<dyn ChangeHandler> = Arc::clone(inner) as Arc<dyn ChangeHandler>;
        entity.register(
            inner.path.as_str(),
            ObservationOptions::old_and_new(trigger_initial),
            handler,
        )?;

        debug!(
            entity_id = %inner.entity_id,
            path = %inner.path,
            token = %inner.token,
            trigger_initial,
            "subscription created"
        );

        Ok(subscription)
    }

    /// The observed entity, unless it was released or the subscription
    /// invalidated.
    #[must_use]
    pub fn entity(&self) -> Option<Arc<dyn Observable>> {
        self.inner.resolve_entity()
    }

    /// Id of the observed entity, kept after the entity is released.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.inner.entity_id
    }

    /// Observed attribute path.
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        &self.inner.path
    }

    /// Token this subscription is registered under.
    #[must_use]
    pub fn token(&self) -> RegistrationToken {
        self.inner.token
    }

    /// Whether the subscription was created with an initial trigger.
    #[must_use]
    pub fn trigger_initial(&self) -> bool {
        self.inner.trigger_initial
    }

    /// Lifecycle state of this subscription.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.inner.lifecycle.state()
    }

    /// True once a group has taken over this subscription's callback.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.inner.grouped.load(Ordering::Acquire)
    }

    /// True while a callback is set.
    #[must_use]
    pub fn has_callback(&self) -> bool {
        lock::read(&self.inner.callback).is_some()
    }

    /// Replace the callback. Later changes go to `callback`.
    ///
    /// # Errors
    /// `CallbackOwnedByGroup` once grouped, `Invalidated` after invalidation.
    pub fn set_callback<F>(&self, callback: F) -> WatchResult<()>
    where
        F: Fn(&Arc<dyn Observable>, &AttributePath, Option<&Value>, Option<&Value>)
            + Send
            + Sync
            + 'static,
    {
        self.check_callback_writable()?;
        self.inner.replace_callback(Some(callback_fn(callback)));
        Ok(())
    }

    /// Remove the callback; later changes are dropped silently.
    ///
    /// # Errors
    /// `CallbackOwnedByGroup` once grouped, `Invalidated` after invalidation.
    pub fn clear_callback(&self) -> WatchResult<()> {
        self.check_callback_writable()?;
        self.inner.replace_callback(None);
        Ok(())
    }

    fn check_callback_writable(&self) -> WatchResult<()> {
        if self.is_grouped() {
            return Err(WatchError::CallbackOwnedByGroup {
                path: self.inner.path.clone(),
            });
        }
        if !self.inner.is_active() {
            return Err(WatchError::Invalidated {
                path: self.inner.path.clone(),
            });
        }
        Ok(())
    }
}

impl Observation for Subscription {
    /// Invalidates this subscription. A grouped member invalidates its whole
    /// group instead.
    fn invalidate(&self) {
        match self.inner.owning_group() {
            Some(group) => group.invalidate(),
            None => self.inner.invalidate(),
        }
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.invalidate();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("entity_id", &self.inner.entity_id)
            .field("path", &self.inner.path)
            .field("token", &self.inner.token)
            .field("trigger_initial", &self.inner.trigger_initial)
            .field("state", &self.state())
            .field("grouped", &self.is_grouped())
            .finish()
    }
}
