//! Concurrent event bus.
//!
//! Every handler of a publish round runs on its own tokio task. The
//! publisher waits until all of them have settled, then gets either the
//! dispatch count or one [`HandlerFailure`] listing every fault.
//!
//! ```text
//! publish(event, payload)
//!     │  snapshot handlers (lock released before dispatch)
//!     ├──► task 1 ──► handler1.handle() ──┐
//!     ├──► task 2 ──► handler2.handle() ──┼──► wait for all ──► Ok(n) | HandlerFailure
//!     └──► task N ──► handlerN.handle() ──┘
//!                       └─ error / panic / timeout recorded as a fault
//! ```
//!
//! ## Rules
//! - **Isolation**: an error or panic in one handler never stops a sibling.
//! - **No ordering**: handlers start in subscription order but may finish
//!   in any order.
//! - **Timeout** (optional, [`BusConfig::publish_timeout_ms`]): handlers
//!   still running at the deadline are aborted and reported as timed out.
//! - **Cancellation**: dropping the publish future aborts the round's
//!   outstanding handler tasks. The registry is never touched by publish.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{Instrument, debug, trace, warn};
use uuid::Uuid;

use crate::config::BusConfig;
use crate::error::{BusResult, FaultKind, HandlerFailure, HandlerFault};
use crate::handler::{AsyncEventHandler, HandlerResult};
use crate::id::SubscriptionId;
use crate::registry::{SubscriptionRegistry, validate_event_name};

type TaskOutcome = Result<HandlerResult, Box<dyn Any + Send>>;

/// Asynchronous publish/subscribe bus with concurrent fan-out.
///
/// Clones share the same registry. Publishing requires a tokio runtime.
///
/// ```rust
/// use std::sync::Arc;
/// use herald_events::{AsyncEventBus, handler_fn};
/// use serde_json::{Value, json};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> herald_events::BusResult<()> {
/// let bus: AsyncEventBus = AsyncEventBus::new();
/// bus.subscribe(
///     "user.login",
///     handler_fn(|_event: String, payload: Arc<Value>| async move {
///         tracing::info!(%payload, "fetching profile");
///         Ok(())
///     }),
/// )?;
///
/// let dispatched = bus.publish("user.login", json!({ "user_id": 42 })).await?;
/// assert_eq!(dispatched, 1);
/// # Ok(())
/// # }
/// ```
pub struct AsyncEventBus<P: 'static = Value> {
    registry: Arc<SubscriptionRegistry<dyn AsyncEventHandler<P>>>,
    config: Arc<BusConfig>,
}

impl<P: 'static> Clone for AsyncEventBus<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        }
    }
}

impl<P: 'static> std::fmt::Debug for AsyncEventBus<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncEventBus")
            .field("name", &self.config.name)
            .field("publish_timeout_ms", &self.config.publish_timeout_ms)
            .field("registry", &self.registry)
            .finish()
    }
}

impl<P> Default for AsyncEventBus<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Aborts every task of a round that is still running when dropped.
struct RoundGuard {
    handles: Vec<AbortHandle>,
}

impl Drop for RoundGuard {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl<P> AsyncEventBus<P>
where
    P: Send + Sync + 'static,
{
    /// Create a bus with the default configuration (no publish timeout).
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
    /// Returns [`BusError::InvalidArgument`](crate::BusError::InvalidArgument)
    /// if the configuration is invalid.
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

    /// Subscribe `handler` to `event`. Never suspends.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`](crate::BusError::InvalidArgument)
    /// if `event` is blank. The registry is left untouched.
    pub fn subscribe<H>(&self, event: &str, handler: H) -> BusResult<SubscriptionId>
    where
        H: AsyncEventHandler<P>,
    {
        self.subscribe_arc(event, Arc::new(handler))
    }

    /// Subscribe a shared handler.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`](crate::BusError::InvalidArgument)
    /// if `event` is blank.
    pub fn subscribe_arc(
        &self,
        event: &str,
        handler: Arc<dyn AsyncEventHandler<P>>,
    ) -> BusResult<SubscriptionId> {
        self.registry.insert(event, handler)
    }

    /// Remove a subscription. Rounds already in flight keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownSubscription`](crate::BusError::UnknownSubscription)
    /// if `id` was not issued by this bus or was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> BusResult<()> {
        self.registry.remove(id)
    }

    /// Number of active subscriptions for `event`, or across all events
    /// when `event` is `None`.
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

    /// Remove every subscription. In-flight rounds are not affected.
    pub fn clear(&self) {
        self.registry.clear();
    }

    /// Publish `payload` to every handler subscribed to `event`,
    /// concurrently.
    ///
    /// See [`publish_arc`](Self::publish_arc).
    ///
    /// # Errors
    ///
    /// Same as [`publish_arc`](Self::publish_arc).
    pub async fn publish(&self, event: &str, payload: P) -> BusResult<usize> {
        self.publish_arc(event, Arc::new(payload)).await
    }

    /// Publish an already shared payload to every handler subscribed to
    /// `event`, concurrently.
    ///
    /// Handlers come from a snapshot taken when the call starts. Each runs
    /// on its own task; the call returns only after every task has settled.
    /// Returns the number of handlers dispatched.
    ///
    /// # Errors
    ///
    /// - [`BusError::InvalidArgument`](crate::BusError::InvalidArgument) if
    ///   `event` is blank. Nothing is dispatched.
    /// - [`BusError::HandlerFailure`](crate::BusError::HandlerFailure) if any
    ///   handler returned an error, panicked, timed out or was cancelled.
    ///   All other handlers still ran to completion.
    pub async fn publish_arc(&self, event: &str, payload: Arc<P>) -> BusResult<usize> {
        validate_event_name(event)?;

        let span = tracing::debug_span!("publish", bus = %self.config.name, event);
        self.dispatch(event, payload).instrument(span).await
    }

    async fn dispatch(&self, event: &str, payload: Arc<P>) -> BusResult<usize> {
        let snapshot = self.registry.snapshot(event);
        if snapshot.is_empty() {
            trace!("No subscribers");
            return Ok(0);
        }

        let dispatched = snapshot.len();
        let shared_event: Arc<str> = Arc::from(event);
        let mut round = Vec::with_capacity(dispatched);
        let mut guard = RoundGuard {
            handles: Vec::with_capacity(dispatched),
        };

        for (id, handler) in snapshot {
            let name = handler.name().to_string();
            let event = Arc::clone(&shared_event);
            let payload = Arc::clone(&payload);
            let span = tracing::trace_span!("handler", subscription = %id, handler = %name);

            let task: JoinHandle<TaskOutcome> = tokio::spawn(
                async move {
                    trace!("Invoking handler");
                    AssertUnwindSafe(handler.handle(&event, payload))
                        .catch_unwind()
                        .await
                }
                .instrument(span),
            );
            guard.handles.push(task.abort_handle());
            round.push((id, name, task));
        }

        let timeout = self.config.publish_timeout();
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        let mut faults = Vec::new();
        for (id, name, mut task) in round {
            let joined = match deadline {
                Some(deadline) => {
                    if let Ok(joined) = tokio::time::timeout_at(deadline, &mut task).await {
                        joined
                    } else {
                        task.abort();
                        // Polled once, never awaited: a handler that does not
                        // yield would hold the round past the deadline.
                        match (&mut task).now_or_never() {
                            Some(finished) if !matches!(&finished, Err(e) if e.is_cancelled()) => {
                                finished
                            },
                            _ => {
                                // Deadline set means timeout is Some.
                                let after = timeout.unwrap_or_default();
                                faults.push(fault(id, name, FaultKind::TimedOut { after }));
                                continue;
                            },
                        }
                    }
                },
                None => task.await,
            };

            if let Some(kind) = classify(joined) {
                faults.push(fault(id, name, kind));
            }
        }
        drop(guard);

        if faults.is_empty() {
            debug!(dispatched, "Published");
            return Ok(dispatched);
        }

        debug!(dispatched, failures = faults.len(), "Published with failures");
        Err(HandlerFailure {
            event: event.to_string(),
            dispatched,
            faults,
        }
        .into())
    }
}

fn fault(subscription: SubscriptionId, handler: String, kind: FaultKind) -> HandlerFault {
    warn!(
        subscription = %subscription,
        handler = %handler,
        fault = kind.as_label(),
        detail = %kind,
        "Handler failed"
    );
    HandlerFault {
        subscription,
        handler,
        kind,
    }
}

/// Maps a settled task to its fault, or `None` on success.
fn classify(joined: Result<TaskOutcome, JoinError>) -> Option<FaultKind> {
    match joined {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(error))) => Some(FaultKind::Error(error)),
        Ok(Err(panic)) => Some(FaultKind::Panicked {
            message: panic_message(panic.as_ref()),
        }),
        Err(e) if e.is_panic() => Some(FaultKind::Panicked {
            message: panic_message(e.into_panic().as_ref()),
        }),
        Err(_) => Some(FaultKind::Cancelled),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;
    use crate::handler::handler_fn;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl AsyncEventHandler<u32> for Counter {
        async fn handle(&self, _event: &str, payload: Arc<u32>) -> HandlerResult {
            self.hits.fetch_add(usize::try_from(*payload)?, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counter"
        }
    }

    #[tokio::test]
    async fn test_publish_counts_dispatched() {
        let bus: AsyncEventBus<u32> = AsyncEventBus::new();
        let counter = Arc::new(Counter {
            hits: AtomicUsize::new(0),
        });
        bus.subscribe_arc("e", Arc::clone(&counter) as Arc<dyn AsyncEventHandler<u32>>)
            .unwrap();
        bus.subscribe_arc("e", Arc::clone(&counter) as Arc<dyn AsyncEventHandler<u32>>)
            .unwrap();

        assert_eq!(bus.publish("e", 5).await.unwrap(), 2);
        assert_eq!(counter.hits.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus: AsyncEventBus = AsyncEventBus::new();
        assert_eq!(bus.publish("nobody", Value::Null).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_publish_rejects_blank_event() {
        let bus: AsyncEventBus = AsyncEventBus::new();
        let err = bus.publish(" ", Value::Null).await.unwrap_err();
        assert!(matches!(err, BusError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_aggregated() {
        let bus: AsyncEventBus<()> = AsyncEventBus::new();
        let ran = Arc::new(Mutex::new(Vec::new()));

        let mut ids = Vec::new();
        for tag in ["a", "b", "c", "d"] {
            let ran = Arc::clone(&ran);
            let handler = handler_fn(move |_event: String, _payload: Arc<()>| {
                let ran = Arc::clone(&ran);
                async move {
                    match tag {
                        "b" => Err(anyhow::anyhow!("b failed")),
                        "c" => panic!("c panicked"),
                        _ => {
                            ran.lock().unwrap().push(tag);
                            Ok(())
                        },
                    }
                }
            })
            .named(tag);
            ids.push(bus.subscribe("e", handler).unwrap());
        }

        let err = bus.publish("e", ()).await.unwrap_err();
        let BusError::HandlerFailure(failure) = err else {
            panic!("expected aggregate failure");
        };

        assert_eq!(failure.dispatched, 4);
        assert_eq!(failure.faults.len(), 2);
        assert_eq!(failure.succeeded(), 2);

        let b = failure.fault_for(ids[1]).unwrap();
        assert_eq!(b.handler, "b");
        assert!(matches!(&b.kind, FaultKind::Error(e) if e.to_string() == "b failed"));

        let c = failure.fault_for(ids[2]).unwrap();
        assert!(matches!(&c.kind, FaultKind::Panicked { message } if message == "c panicked"));

        let mut ran = ran.lock().unwrap().clone();
        ran.sort_unstable();
        assert_eq!(ran, ["a", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_aborts_slow_handlers() {
        let config = BusConfig::new("timed").with_publish_timeout(Duration::from_millis(50));
        let bus: AsyncEventBus<()> = AsyncEventBus::with_config(config).unwrap();

        let fast = bus
            .subscribe(
                "e",
                handler_fn(|_: String, _: Arc<()>| async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(())
                }),
            )
            .unwrap();
        let slow = bus
            .subscribe(
                "e",
                handler_fn(|_: String, _: Arc<()>| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .named("slow"),
            )
            .unwrap();

        let started = Instant::now();
        let err = bus.publish("e", ()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));

        let BusError::HandlerFailure(failure) = err else {
            panic!("expected aggregate failure");
        };
        assert!(failure.fault_for(fast).is_none());
        let slow_fault = failure.fault_for(slow).unwrap();
        assert!(matches!(
            slow_fault.kind,
            FaultKind::TimedOut { after } if after == Duration::from_millis(50)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_does_not_wait_for_blocking_handler() {
        let config = BusConfig::new("timed").with_publish_timeout(Duration::from_millis(50));
        let bus: AsyncEventBus<()> = AsyncEventBus::with_config(config).unwrap();

        let blocking = bus
            .subscribe(
                "e",
                handler_fn(|_: String, _: Arc<()>| async {
                    // Never reaches an await point, so abort cannot land.
                    std::thread::sleep(Duration::from_millis(800));
                    Ok(())
                })
                .named("blocking"),
            )
            .unwrap();

        let started = Instant::now();
        let err = bus.publish("e", ()).await.unwrap_err();
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "publish waited {:?}",
            started.elapsed()
        );

        let BusError::HandlerFailure(failure) = err else {
            panic!("expected aggregate failure");
        };
        assert_eq!(failure.fault_for(blocking).unwrap().kind.as_label(), "timed_out");
    }

    #[tokio::test]
    async fn test_unsubscribe_during_round_keeps_snapshot() {
        let bus: AsyncEventBus<()> = AsyncEventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let victim_hits = Arc::clone(&hits);
        let victim = bus
            .subscribe(
                "e",
                handler_fn(move |_: String, _: Arc<()>| {
                    let hits = Arc::clone(&victim_hits);
                    async move {
                        tokio::task::yield_now().await;
                        hits.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        let remover = bus.clone();
        bus.subscribe(
            "e",
            handler_fn(move |_: String, _: Arc<()>| {
                let remover = remover.clone();
                async move {
                    // Ignore the error on later rounds, the victim is gone by then.
                    let _ = remover.unsubscribe(victim);
                    Ok(())
                }
            }),
        )
        .unwrap();

        assert_eq!(bus.publish("e", ()).await.unwrap(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!bus.is_subscribed(victim));

        assert_eq!(bus.publish("e", ()).await.unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        bus.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_publish_aborts_outstanding_handlers() {
        let bus: AsyncEventBus<()> = AsyncEventBus::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let finished_clone = Arc::clone(&finished);
        bus.subscribe(
            "e",
            handler_fn(move |_: String, _: Arc<()>| {
                let finished = Arc::clone(&finished_clone);
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), bus.publish("e", ())).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert_eq!(bus.count_subscribers(Some("e")), 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
