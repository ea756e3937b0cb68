//! Subscription identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BusError;

/// Opaque handle returned by `subscribe` and accepted by `unsubscribe`.
///
/// An id is scoped to the bus instance that issued it: the issuing bus's
/// instance UUID plus a per-bus sequence number. Sequence numbers are
/// never reused, not even after `clear`, so a stale id can never alias a
/// newer subscription.
///
/// Within one bus, ids order by issue time, which is also dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId {
    bus: Uuid,
    seq: u64,
}

impl SubscriptionId {
    /// The instance id of the bus that issued this subscription.
    #[must_use]
    pub fn bus_id(&self) -> Uuid {
        self.bus
    }

    /// Issue sequence number within the owning bus (starts at 1).
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.bus, self.seq)
    }
}

impl FromStr for SubscriptionId {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BusError::invalid_argument("subscription id cannot be empty"));
        }

        let (bus, seq) = s.split_once('#').ok_or_else(|| {
            BusError::invalid_argument(format!("malformed subscription id: {s:?}"))
        })?;

        let bus = Uuid::parse_str(bus).map_err(|e| {
            BusError::invalid_argument(format!("malformed subscription id {s:?}: {e}"))
        })?;
        let seq = seq.parse::<u64>().map_err(|e| {
            BusError::invalid_argument(format!("malformed subscription id {s:?}: {e}"))
        })?;
        if seq == 0 {
            return Err(BusError::invalid_argument(format!(
                "malformed subscription id {s:?}: sequence starts at 1"
            )));
        }

        Ok(Self { bus, seq })
    }
}

/// Issues ids for a single bus instance.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    bus: Uuid,
    next: AtomicU64,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self {
            bus: Uuid::new_v4(),
            next: AtomicU64::new(1),
        }
    }

    pub(crate) fn bus_id(&self) -> Uuid {
        self.bus
    }

    pub(crate) fn next(&self) -> SubscriptionId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        SubscriptionId { bus: self.bus, seq }
    }
}
