use std::sync::{Arc, RwLock};

use tracing::{debug, trace, warn};

use crate::config::{GroupConfig, StaleMemberPolicy};
use crate::entity::EntityId;
use crate::error::{WatchError, WatchResult};
use crate::host::Observable;
use crate::lock;
use crate::value::Value;

use super::single::{callback_fn, SubscriptionInner};
use super::{Lifecycle, Observation, Subscription, SubscriptionState};

/// Callback of a group subscription.
pub type GroupCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Current values of every member of a group, in member order.
///
/// `entities[i]` and `values[i]` describe the member at position `i`. An
/// unset attribute is `None` in `values`; a released entity (under
/// [`StaleMemberPolicy::Placeholder`]) is `None` in both.
#[derive(Clone, Default)]
pub struct Snapshot {
    /// Member entities; `None` for a released entity.
    pub entities: Vec<Option<Arc<dyn Observable>>>,
    /// Current member values; `None` for an unset attribute.
    pub values: Vec<Option<Value>>,
}

impl Snapshot {
    /// Number of members reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no members are reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the member at `index`, if set.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Ids of the member entities, in member order.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<Option<EntityId>> {
        self.entities
            .iter()
            .map(|e| e.as_ref().map(|e| e.entity_id()))
            .collect()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("entities", &self.entity_ids())
            .field("values", &self.values)
            .finish()
    }
}

pub(crate) struct GroupInner {
    members: Vec<Arc<SubscriptionInner>>,
    callback: RwLock<Option<GroupCallback>>,
    lifecycle: Lifecycle,
    config: GroupConfig,
}

impl GroupInner {
    fn recompute_and_fire(&self) {
        if !self.lifecycle.is_active() {
            return;
        }

        let mut entities = Vec::with_capacity(self.members.len());
        let mut values = Vec::with_capacity(self.members.len());
        let mut stale = 0usize;

        for member in &self.members {
            if let Some(entity) = member.resolve_entity() {
                values.push(entity.read_value(member.path().as_str()));
                entities.push(Some(entity));
                continue;
            }

            let err = WatchError::StaleReference {
                entity_id: member.entity_id(),
                path: member.path().clone(),
            };
            match self.config.stale_member {
                StaleMemberPolicy::Placeholder => {
                    if stale == 0 {
                        warn!(error = %err, "group member released; reporting placeholder");
                    }
                    stale += 1;
                    entities.push(None);
                    values.push(None);
                }
                StaleMemberPolicy::Abort => {
                    warn!(error = %err, "group member released; skipping group callback");
                    return;
                }
            }
        }

        let Some(callback) = lock::read(&self.callback).clone() else {
            return;
        };

        trace!(members = self.members.len(), stale, "firing group callback");
        callback(&Snapshot { entities, values });
    }

    pub(crate) fn invalidate(&self) {
        if !self.lifecycle.invalidate() {
            return;
        }

        for member in &self.members {
            member.invalidate();
        }
        *lock::write(&self.callback) = None;

        debug!(members = self.members.len(), "group subscription invalidated");
    }
}

/// A fixed, ordered set of subscriptions reported through one callback.
///
/// Building a group takes over every member's callback: any change to any
/// member recomputes the full [`Snapshot`] and fires the group callback once.
/// If at least one member was created with `trigger_initial`, the group fires
/// once during construction, after all members are wired.
///
/// Dropping the group invalidates it and all its members.
pub struct GroupSubscription {
    inner: Arc<GroupInner>,
    members: Vec<Subscription>,
}

impl GroupSubscription {
    /// Group `members` under `callback` with the default configuration.
    ///
    /// # Errors
    /// See [`GroupSubscription::with_config`].
    pub fn new<F>(members: Vec<Subscription>, callback: F) -> WatchResult<Self>
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let callback: GroupCallback = Arc::new(callback);
        Self::assemble(members, GroupConfig::default(), Some(callback))
    }

    /// Group `members` under `callback`.
    ///
    /// # Errors
    /// - `EmptyGroup` if `members` is empty
    /// - `Invalidated` if a member was already invalidated
    /// - `StaleReference` if a member's entity was already released
    ///
    /// On error the members are dropped, which invalidates them.
    pub fn with_config<F>(
        members: Vec<Subscription>,
        config: GroupConfig,
        callback: F,
    ) -> WatchResult<Self>
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let callback: GroupCallback = Arc::new(callback);
        Self::assemble(members, config, Some(callback))
    }

    fn assemble(
        members: Vec<Subscription>,
        config: GroupConfig,
        callback: Option<GroupCallback>,
    ) -> WatchResult<Self> {
        if members.is_empty() {
            return Err(WatchError::EmptyGroup);
        }

        for member in &members {
            if !member.inner.is_active() {
                return Err(WatchError::Invalidated {
                    path: member.path().clone(),
                });
            }
            if member.inner.resolve_entity().is_none() {
                return Err(WatchError::StaleReference {
                    entity_id: member.entity_id(),
                    path: member.path().clone(),
                });
            }
        }

        let inner = Arc::new(GroupInner {
            members: members.iter().map(|m| Arc::clone(&m.inner)).collect(),
            callback: RwLock::new(callback),
            lifecycle: Lifecycle::new(),
            config,
        });

        for member in &members {
            let group = Arc::downgrade(&inner);
            member.inner.mark_grouped(Arc::downgrade(&inner));
            member.inner.replace_callback(Some(callback_fn(move |_, _, _, _| {
                if let Some(group) = group.upgrade() {
                    group.recompute_and_fire();
                }
            })));
        }

        let any_initial = members.iter().any(Subscription::trigger_initial);

        debug!(
            members = members.len(),
            any_initial,
            stale_member = ?inner.config.stale_member,
            "group subscription created"
        );

        if any_initial {
            inner.recompute_and_fire();
        }

        Ok(Self { inner, members })
    }

    /// Member subscriptions, in the order they were supplied.
    #[must_use]
    pub fn members(&self) -> &[Subscription] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: groups are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True if the group fired, or would have fired, on construction.
    #[must_use]
    pub fn trigger_initial(&self) -> bool {
        self.members.iter().any(Subscription::trigger_initial)
    }

    /// Configuration the group was built with.
    #[must_use]
    pub fn config(&self) -> &GroupConfig {
        &self.inner.config
    }

    /// Lifecycle state of the group.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.inner.lifecycle.state()
    }

    /// True while a group callback is set.
    #[must_use]
    pub fn has_callback(&self) -> bool {
        lock::read(&self.inner.callback).is_some()
    }

    /// Replace the group callback.
    ///
    /// # Errors
    /// `Invalidated` after invalidation.
    pub fn set_callback<F>(&self, callback: F) -> WatchResult<()>
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.check_active()?;
        let callback: GroupCallback = Arc::new(callback);
        *lock::write(&self.inner.callback) = Some(callback);
        Ok(())
    }

    /// Remove the group callback; later changes are dropped silently.
    ///
    /// # Errors
    /// `Invalidated` after invalidation.
    pub fn clear_callback(&self) -> WatchResult<()> {
        self.check_active()?;
        *lock::write(&self.inner.callback) = None;
        Ok(())
    }

    /// Current snapshot, computed without firing the callback.
    ///
    /// Released members are reported as placeholders regardless of the
    /// configured policy.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            entities: Vec::with_capacity(self.members.len()),
            values: Vec::with_capacity(self.members.len()),
        };
        for member in &self.inner.members {
            let entity = member.resolve_entity();
            snapshot
                .values
                .push(entity.as_ref().and_then(|e| e.read_value(member.path().as_str())));
            snapshot.entities.push(entity);
        }
        snapshot
    }

    fn check_active(&self) -> WatchResult<()> {
        if self.inner.lifecycle.is_active() {
            Ok(())
        } else {
            // Members are never empty, so the first path names the group.
            Err(WatchError::Invalidated {
                path: self.members[0].path().clone(),
            })
        }
    }
}

impl Observation for GroupSubscription {
    fn invalidate(&self) {
        self.inner.invalidate();
    }

    fn is_active(&self) -> bool {
        self.inner.lifecycle.is_active()
    }
}

impl Drop for GroupSubscription {
    fn drop(&mut self) {
        self.inner.invalidate();
    }
}

impl std::fmt::Debug for GroupSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupSubscription")
            .field("members", &self.members)
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::host::ObservableObject;

    type Fired = Arc<Mutex<Vec<Vec<Option<Value>>>>>;

    fn collector() -> (Fired, impl Fn(&Snapshot) + Send + Sync + 'static) {
        let fired: Fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        (fired, move |snapshot: &Snapshot| {
            sink.lock().unwrap().push(snapshot.values.clone());
        })
    }

    fn names(values: &[&str]) -> Vec<Option<Value>> {
        values.iter().map(|v| Some(Value::from(*v))).collect()
    }

    #[test]
    fn test_empty_group_rejected() {
        let (_, callback) = collector();
        let err = GroupSubscription::new(Vec::new(), callback).unwrap_err();
        assert!(matches!(err, WatchError::EmptyGroup));
    }

    #[test]
    fn test_invalidated_member_rejected() {
        let obj = ObservableObject::with_attributes([("name", "Daniel")]);
        let member = Subscription::new(&obj, "name", false).unwrap();
        member.invalidate();
        let (_, callback) = collector();
        let err = GroupSubscription::new(vec![member], callback).unwrap_err();
        assert!(matches!(err, WatchError::Invalidated { .. }));
    }

    #[test]
    fn test_released_member_rejected() {
        let kept = ObservableObject::with_attributes([("name", "Alana")]);
        let released = ObservableObject::with_attributes([("name", "Daniel")]);
        let a = Subscription::new(&kept, "name", false).unwrap();
        let b = Subscription::new(&released, "name", false).unwrap();
        drop(released);

        let (_, callback) = collector();
        let err = GroupSubscription::new(vec![a, b], callback).unwrap_err();
        assert!(err.is_stale());
        assert_eq!(kept.observer_count("name"), 0);
    }

    #[test]
    fn test_initial_policy_is_or_of_members() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let e2 = ObservableObject::with_attributes([("name", "Alana")]);
        let a = Subscription::new(&e1, "name", false).unwrap();
        let b = Subscription::new(&e2, "name", true).unwrap();

        let (fired, callback) = collector();
        let group = GroupSubscription::new(vec![a, b], callback).unwrap();

        assert!(group.trigger_initial());
        assert_eq!(*fired.lock().unwrap(), vec![names(&["Daniel", "Alana"])]);
    }

    #[test]
    fn test_members_are_marked_grouped() {
        let obj = ObservableObject::with_attributes([("name", "Daniel")]);
        let member = Subscription::new(&obj, "name", false).unwrap();
        let (_, callback) = collector();
        let group = GroupSubscription::new(vec![member], callback).unwrap();

        let member = &group.members()[0];
        assert!(member.is_grouped());
        assert!(member.has_callback());
        assert!(matches!(
            member.set_callback(|_, _, _, _| {}),
            Err(WatchError::CallbackOwnedByGroup { .. })
        ));
        assert!(matches!(
            member.clear_callback(),
            Err(WatchError::CallbackOwnedByGroup { .. })
        ));
    }

    #[test]
    fn test_unset_attribute_is_explicit_none() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let e2 = ObservableObject::new();
        let members = vec![
            Subscription::new(&e1, "name", true).unwrap(),
            Subscription::new(&e2, "name", true).unwrap(),
        ];
        let (fired, callback) = collector();
        let _group = GroupSubscription::new(members, callback).unwrap();

        assert_eq!(
            *fired.lock().unwrap(),
            vec![vec![Some(Value::from("Daniel")), None]]
        );
    }

    #[test]
    fn test_stale_member_placeholder() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let e2 = ObservableObject::with_attributes([("name", "Alana")]);
        let members = vec![
            Subscription::new(&e1, "name", false).unwrap(),
            Subscription::new(&e2, "name", false).unwrap(),
        ];
        let entities: Arc<Mutex<Vec<Vec<Option<EntityId>>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&entities);
        let (fired, record) = collector();
        let _group = GroupSubscription::new(members, move |snapshot: &Snapshot| {
            sink.lock().unwrap().push(snapshot.entity_ids());
            record(snapshot);
        })
        .unwrap();

        drop(e2);
        e1.set("name", "Dan");

        assert_eq!(
            *fired.lock().unwrap(),
            vec![vec![Some(Value::from("Dan")), None]]
        );
        let entities = entities.lock().unwrap();
        assert_eq!(entities[0], vec![Some(e1.id()), None]);
    }

    #[test]
    fn test_stale_member_abort() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let e2 = ObservableObject::with_attributes([("name", "Alana")]);
        let members = vec![
            Subscription::new(&e1, "name", false).unwrap(),
            Subscription::new(&e2, "name", false).unwrap(),
        ];
        let (fired, callback) = collector();
        let config = GroupConfig::default().with_stale_member(StaleMemberPolicy::Abort);
        let _group = GroupSubscription::with_config(members, config, callback).unwrap();

        drop(e2);
        e1.set("name", "Dan");

        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalidate_propagates_to_members() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let e2 = ObservableObject::with_attributes([("name", "Alana")]);
        let members = vec![
            Subscription::new(&e1, "name", false).unwrap(),
            Subscription::new(&e2, "name", false).unwrap(),
        ];
        let (fired, callback) = collector();
        let group = GroupSubscription::new(members, callback).unwrap();

        group.invalidate();
        group.invalidate();

        assert_eq!(group.state(), SubscriptionState::Invalidated);
        assert!(group.members().iter().all(|m| !m.is_active()));
        assert_eq!(e1.observer_count("name"), 0);
        assert_eq!(e2.observer_count("name"), 0);
        assert!(group.set_callback(|_| {}).is_err());

        e1.set("name", "Dan");
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drop_unregisters_members() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        {
            let members = vec![Subscription::new(&e1, "name", false).unwrap()];
            let (_, callback) = collector();
            let _group = GroupSubscription::new(members, callback).unwrap();
            assert_eq!(e1.observer_count("name"), 1);
        }
        assert_eq!(e1.observer_count("name"), 0);
    }

    #[test]
    fn test_snapshot_does_not_fire() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let members = vec![Subscription::new(&e1, "name", false).unwrap()];
        let (fired, callback) = collector();
        let group = GroupSubscription::new(members, callback).unwrap();

        let snapshot = group.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.value(0), Some(&Value::from("Daniel")));
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cleared_callback_drops_changes() {
        let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
        let members = vec![Subscription::new(&e1, "name", false).unwrap()];
        let (fired, callback) = collector();
        let group = GroupSubscription::new(members, callback).unwrap();

        group.clear_callback().unwrap();
        assert!(!group.has_callback());
        e1.set("name", "Dan");
        assert!(fired.lock().unwrap().is_empty());
        assert!(group.is_active());
    }
}
