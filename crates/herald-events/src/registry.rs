//! Subscription registry shared by both dispatch variants.
//!
//! The registry owns every handler. Callers only ever hold the
//! [`SubscriptionId`] returned at subscribe time.
//!
//! ```text
//! by_event:  "user.login"    ─► { #1 ─► handler, #4 ─► handler }
//!            "order.created" ─► { #2 ─► handler, #3 ─► handler }
//! index:     #1 ─► "user.login", #2 ─► "order.created", ...
//! ```
//!
//! Both maps sit behind one lock so a removal is never half-visible. The
//! per-event maps are keyed by id, and ids are issued in increasing order,
//! so iteration order equals subscription order.
//!
//! Handlers are never invoked while the lock is held: dispatchers take a
//! [`snapshot`](SubscriptionRegistry::snapshot) and release the lock first.
//! Removed handlers are dropped after the lock is released too, so a
//! handler's `Drop` may call back into the bus.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use uuid::Uuid;

use crate::error::{BusError, BusResult};
use crate::id::{IdAllocator, SubscriptionId};

/// Handlers subscribed to one event, in subscription order.
pub(crate) type Snapshot<H> = Vec<(SubscriptionId, Arc<H>)>;

struct RegistryState<H: ?Sized> {
    by_event: HashMap<Arc<str>, BTreeMap<SubscriptionId, Arc<H>>>,
    index: HashMap<SubscriptionId, Arc<str>>,
}

impl<H: ?Sized> RegistryState<H> {
    fn empty() -> Self {
        Self {
            by_event: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

/// Event name to ordered handler list, plus an id index for removal.
pub(crate) struct SubscriptionRegistry<H: ?Sized> {
    ids: IdAllocator,
    state: RwLock<RegistryState<H>>,
}

impl<H: ?Sized> std::fmt::Debug for SubscriptionRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("SubscriptionRegistry")
            .field("bus_id", &self.ids.bus_id())
            .field("events", &state.by_event.len())
            .field("subscriptions", &state.index.len())
            .finish()
    }
}

/// Rejects event names that are empty or whitespace only.
pub(crate) fn validate_event_name(event: &str) -> BusResult<()> {
    if event.trim().is_empty() {
        return Err(BusError::invalid_argument("event name cannot be empty"));
    }
    Ok(())
}

impl<H: ?Sized> SubscriptionRegistry<H> {
    pub(crate) fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            state: RwLock::new(RegistryState::empty()),
        }
    }

    pub(crate) fn bus_id(&self) -> Uuid {
        self.ids.bus_id()
    }

    // No user code runs under the lock, so a poisoned lock still guards
    // consistent maps.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState<H>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState<H>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `handler` to the end of `event`'s list.
    pub(crate) fn insert(&self, event: &str, handler: Arc<H>) -> BusResult<SubscriptionId> {
        validate_event_name(event)?;

        // Ids are issued under the write lock so id order is insertion order.
        let mut state = self.write();
        let id = self.ids.next();
        let key = match state.by_event.get_key_value(event) {
            Some((key, _)) => Arc::clone(key),
            None => Arc::from(event),
        };
        state
            .by_event
            .entry(Arc::clone(&key))
            .or_default()
            .insert(id, handler);
        state.index.insert(id, key);
        drop(state);

        debug!(event, subscription = %id, "Subscribed");
        Ok(id)
    }

    /// Removes the subscription, pruning the event entry if it empties.
    pub(crate) fn remove(&self, id: SubscriptionId) -> BusResult<()> {
        let mut state = self.write();
        let Some(event) = state.index.remove(&id) else {
            return Err(BusError::UnknownSubscription { id });
        };

        let mut removed = None;
        if let Some(handlers) = state.by_event.get_mut(&event) {
            removed = handlers.remove(&id);
            if handlers.is_empty() {
                state.by_event.remove(&event);
            }
        }
        drop(state);

        // The handler is dropped here, outside the lock.
        drop(removed);
        debug!(event = %event, subscription = %id, "Unsubscribed");
        Ok(())
    }

    /// Number of active subscriptions for `event`, or across all events.
    pub(crate) fn count(&self, event: Option<&str>) -> usize {
        let state = self.read();
        match event {
            Some(event) => state.by_event.get(event).map_or(0, BTreeMap::len),
            None => state.index.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.read().index.is_empty()
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.read().index.contains_key(&id)
    }

    /// Events with at least one subscription, sorted by name.
    pub(crate) fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .by_event
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Removes every subscription. Returns how many were removed.
    pub(crate) fn clear(&self) -> usize {
        let old = std::mem::replace(&mut *self.write(), RegistryState::empty());
        let removed = old.index.len();
        drop(old);

        debug!(removed, "All subscriptions cleared");
        removed
    }

    /// Handlers currently subscribed to `event`, in subscription order.
    pub(crate) fn snapshot(&self, event: &str) -> Snapshot<H> {
        self.read().by_event.get(event).map_or_else(Vec::new, |handlers| {
            handlers
                .iter()
                .map(|(id, handler)| (*id, Arc::clone(handler)))
                .collect()
        })
    }
}
