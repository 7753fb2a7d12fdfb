use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::GroupConfig;
use crate::entity::AttributePath;
use crate::error::WatchResult;
use crate::host::Observable;
use crate::value::Value;

use super::group::{GroupSubscription, Snapshot};
use super::single::Subscription;

/// Observe `path` on `entity`.
///
/// With `trigger_initial`, `callback` runs once before this returns with no
/// old value and the current value as new value. Afterwards it runs once per
/// mutation, on the mutating thread.
///
/// # Errors
/// `EmptyPath` for an empty path, or the host's registration error.
pub fn observe<E, F>(
    entity: &Arc<E>,
    path: impl Into<AttributePath>,
    trigger_initial: bool,
    callback: F,
) -> WatchResult<Subscription>
where
    E: Observable + 'static,
    F: Fn(&Arc<dyn Observable>, &AttributePath, Option<&Value>, Option<&Value>)
        + Send
        + Sync
        + 'static,
{
    Subscription::with_callback(entity, path, trigger_initial, callback)
}

/// Observe `path` on `entity`, decoding values as `T`.
///
/// Changes whose old or new value does not decode as `T` are logged and
/// dropped.
///
/// # Errors
/// `EmptyPath` for an empty path, or the host's registration error.
pub fn observe_typed<E, T, F>(
    entity: &Arc<E>,
    path: impl Into<AttributePath>,
    trigger_initial: bool,
    callback: F,
) -> WatchResult<Subscription>
where
    E: Observable + 'static,
    T: DeserializeOwned + 'static,
    F: Fn(&Arc<dyn Observable>, &AttributePath, Option<T>, Option<T>) + Send + Sync + 'static,
{
    Subscription::with_callback(entity, path, trigger_initial, move |entity, path, old, new| {
        let decoded = old
            .map(Value::decode::<T>)
            .transpose()
            .and_then(|old| Ok((old, new.map(Value::decode::<T>).transpose()?)));
        match decoded {
            Ok((old, new)) => callback(entity, path, old, new),
            Err(err) => warn!(
                entity_id = %entity.entity_id(),
                path = %path,
                error = %err,
                "dropping change that does not decode"
            ),
        }
    })
}

/// Merge `subscriptions` into one group reporting through `callback`.
///
/// The group takes over each subscription's callback. It fires once right
/// away if any subscription was created with `trigger_initial`.
///
/// # Errors
/// See [`GroupSubscription::with_config`].
pub fn combine<F>(subscriptions: Vec<Subscription>, callback: F) -> WatchResult<GroupSubscription>
where
    F: Fn(&Snapshot) + Send + Sync + 'static,
{
    GroupSubscription::new(subscriptions, callback)
}

/// [`combine`] with an explicit configuration.
///
/// # Errors
/// See [`GroupSubscription::with_config`].
pub fn combine_with_config<F>(
    subscriptions: Vec<Subscription>,
    config: GroupConfig,
    callback: F,
) -> WatchResult<GroupSubscription>
where
    F: Fn(&Snapshot) + Send + Sync + 'static,
{
    GroupSubscription::with_config(subscriptions, config, callback)
}

/// Observe the same `path` on every entity in `of_entities` as one group.
///
/// Every member is created with `trigger_initial`, so `callback` fires once
/// before this returns.
///
/// # Examples
///
/// ```
/// use attrwatch::{observe_attribute, ObservableObject};
///
/// let e1 = ObservableObject::with_attributes([("name", "Daniel")]);
/// let e2 = ObservableObject::with_attributes([("name", "Alana")]);
///
/// let group = observe_attribute("name", &[e1.clone(), e2.clone()], |snapshot| {
///     assert_eq!(snapshot.len(), 2);
/// })?;
/// e1.set("name", "Dan");
/// # drop(group);
/// # Ok::<(), attrwatch::WatchError>(())
/// ```
///
/// # Errors
/// `EmptyGroup` if `of_entities` is empty, or any error from subscribing.
pub fn observe_attribute<E, F>(
    path: impl Into<AttributePath>,
    of_entities: &[Arc<E>],
    callback: F,
) -> WatchResult<GroupSubscription>
where
    E: Observable + 'static,
    F: Fn(&Snapshot) + Send + Sync + 'static,
{
    let path = path.into();
    let members = of_entities
        .iter()
        .map(|entity| Subscription::new(entity, &path, true))
        .collect::<WatchResult<Vec<_>>>()?;
    combine(members, callback)
}
