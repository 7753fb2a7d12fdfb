use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};

use crate::entity::{AttributePath, EntityId};
use crate::error::{WatchError, WatchResult};
use crate::host::Observable;
use crate::value::Value;

use super::single::Subscription;

/// An owned record of one delivered change.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: EntityId,
    pub path: AttributePath,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub observed_at: DateTime<Utc>,
}

/// Receiving end of [`observe_channel`].
///
/// The stream disconnects once its subscription is invalidated, after any
/// buffered events have been received.
#[derive(Debug)]
pub struct ChangeStream {
    rx: Receiver<ChangeEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChangeStream {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> WatchResult<ChangeEvent> {
        self.rx.recv().map_err(|_| WatchError::Disconnected)
    }

    /// Receive the next event if one is buffered.
    pub fn try_recv(&self) -> WatchResult<Option<ChangeEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(WatchError::Disconnected),
        }
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> WatchResult<ChangeEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WatchError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => WatchError::Disconnected,
        })
    }

    /// All currently buffered events.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }

    /// Number of events discarded because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Observe `path` on `entity`, forwarding changes into a bounded channel.
///
/// Delivery never blocks the mutating thread: when `capacity` events are
/// already buffered, new events are discarded and counted by
/// [`ChangeStream::dropped`]. Grouping the returned subscription replaces its
/// callback and disconnects the stream.
///
/// # Errors
/// `EmptyPath` for an empty path, or the host's registration error.
pub fn observe_channel<E>(
    entity: &Arc<E>,
    path: impl Into<AttributePath>,
    trigger_initial: bool,
    capacity: usize,
) -> WatchResult<(Subscription, ChangeStream)>
where
    E: Observable + 'static,
{
    let (tx, rx) = bounded::<ChangeEvent>(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let counter = Arc::clone(&dropped);
    let subscription = Subscription::with_callback(
        entity,
        path,
        trigger_initial,
        move |entity, path, old, new| {
            let event = ChangeEvent {
                entity_id: entity.entity_id(),
                path: path.clone(),
                old: old.cloned(),
                new: new.cloned(),
                observed_at: Utc::now(),
            };
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
        },
    )?;

    Ok((subscription, ChangeStream { rx, dropped }))
}
