//! Sequential event bus.
//!
//! Handlers run one at a time, in subscription order, on the publisher's
//! thread. There is no failure isolation: the first handler error ends the
//! round and is returned to the publisher, and a handler panic unwinds
//! straight through [`EventBus::publish`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use crate::handler::EventHandler;
use crate::id::SubscriptionId;
use crate::registry::{SubscriptionRegistry, validate_event_name};

/// Synchronous publish/subscribe bus.
///
/// Clones share the same registry, so one bus built at the composition root
/// can be handed to every component that publishes or subscribes.
///
/// **WARNING:** storing a clone of the bus inside one of its own handlers
/// creates an `Arc` cycle that keeps the registry alive until the handler
/// is unsubscribed or the bus is cleared.
///
/// ```rust
/// use herald_events::{EventBus, HandlerResult};
/// use serde_json::{Value, json};
///
/// let bus: EventBus = EventBus::new();
/// let id = bus
///     .subscribe("user.login", |event: &str, payload: &Value| -> HandlerResult {
///         tracing::info!(event, %payload, "login");
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(bus.publish("user.login", &json!({ "user_id": 123 })).unwrap(), 1);
/// bus.unsubscribe(id).unwrap();
/// assert_eq!(bus.publish("user.login", &json!({ "user_id": 456 })).unwrap(), 0);
/// ```
pub struct EventBus<P: 'static = Value> {
    registry: Arc<SubscriptionRegistry<dyn EventHandler<P>>>,
    config: Arc<BusConfig>,
}

impl<P: 'static> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        }
    }
}

impl<P: 'static> std::fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.config.name)
            .field("registry", &self.registry)
            .finish()
    }
}

impl<P: 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> EventBus<P> {
    /// Create a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(SubscriptionRegistry::new()),
            config: Arc::new(BusConfig::default()),
        }
    }

    /// Create a bus with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`] if the configuration is invalid.
    pub fn with_config(config: BusConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(SubscriptionRegistry::new()),
            config: Arc::new(config),
        })
    }

    /// The bus configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Instance id embedded in every [`SubscriptionId`] this bus issues.
    #[must_use]
    pub fn bus_id(&self) -> Uuid {
        self.registry.bus_id()
    }

    /// Subscribe `handler` to `event`.
    ///
    /// The handler is appended after every existing handler for the event.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`] if `event` is blank. The
    /// registry is left untouched.
    pub fn subscribe<H>(&self, event: &str, handler: H) -> BusResult<SubscriptionId>
    where
        H: EventHandler<P>,
    {
        self.subscribe_arc(event, Arc::new(handler))
    }

    /// Subscribe a shared handler, e.g. one handler registered to several
    /// events.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`] if `event` is blank.
    pub fn subscribe_arc(
        &self,
        event: &str,
        handler: Arc<dyn EventHandler<P>>,
    ) -> BusResult<SubscriptionId> {
        self.registry.insert(event, handler)
    }

    /// Remove a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownSubscription`] if `id` was not issued by
    /// this bus or was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> BusResult<()> {
        self.registry.remove(id)
    }

    /// Number of active subscriptions for `event`, or across all events
    /// when `event` is `None`. Unknown events count as zero.
    #[must_use]
    pub fn count_subscribers(&self, event: Option<&str>) -> usize {
        self.registry.count(event)
    }

    /// Whether the bus has no subscriptions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Whether `id` is an active subscription on this bus.
    #[must_use]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.registry.contains(id)
    }

    /// Events that currently have at least one subscriber, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.registry.event_names()
    }

    /// Remove every subscription. Issued ids become invalid; the id
    /// sequence keeps counting.
    pub fn clear(&self) {
        self.registry.clear();
    }

    /// Publish `payload` to every handler subscribed to `event`.
    ///
    /// Handlers are taken from a snapshot made at the start of the call and
    /// invoked in subscription order, each finishing before the next starts.
    /// Subscriptions added or removed by a handler only affect later rounds.
    ///
    /// Returns the number of handlers invoked; zero when nobody listens.
    ///
    /// # Errors
    ///
    /// - [`BusError::InvalidArgument`] if `event` is blank.
    /// - [`BusError::Handler`] for the first handler that returns an error.
    ///   Handlers after it are not invoked.
    ///
    /// # Panics
    ///
    /// A panicking handler is not caught; the panic propagates to the
    /// caller and the remaining handlers are skipped.
    pub fn publish(&self, event: &str, payload: &P) -> BusResult<usize> {
        validate_event_name(event)?;

        let span = tracing::debug_span!("publish", bus = %self.config.name, event);
        let _guard = span.enter();

        let snapshot = self.registry.snapshot(event);
        if snapshot.is_empty() {
            trace!("No subscribers");
            return Ok(0);
        }

        let dispatched = snapshot.len();
        for (id, handler) in snapshot {
            trace!(subscription = %id, handler = handler.name(), "Invoking handler");

            if let Err(source) = handler.handle(event, payload) {
                warn!(
                    subscription = %id,
                    handler = handler.name(),
                    error = %source,
                    "Handler failed, aborting publish"
                );
                return Err(BusError::Handler {
                    event: event.to_string(),
                    subscription: id,
                    handler: handler.name().to_string(),
                    source,
                });
            }
        }

        debug!(dispatched, "Published");
        Ok(dispatched)
    }
}
