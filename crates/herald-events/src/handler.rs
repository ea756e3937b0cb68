//! Handler contracts for both dispatch variants.
//!
//! A handler is invoked with the event name and the published payload. It
//! reports failure by returning `Err`; the bus decides what happens next
//! (propagate for [`EventBus`](crate::EventBus), isolate and aggregate for
//! [`AsyncEventBus`](crate::AsyncEventBus)).

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

/// Result returned by every handler.
pub type HandlerResult = anyhow::Result<()>;

/// Handler for the sequential [`EventBus`](crate::EventBus).
///
/// Invoked synchronously on the publisher's thread, in subscription order.
/// Closures `Fn(&str, &P) -> HandlerResult` implement this trait directly.
pub trait EventHandler<P>: Send + Sync + 'static {
    /// Handles one published event.
    ///
    /// # Errors
    ///
    /// An error aborts the rest of the publish round and is returned to the
    /// publisher.
    fn handle(&self, event: &str, payload: &P) -> HandlerResult;

    /// Name used in logs and errors.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<P, F> EventHandler<P> for F
where
    F: Fn(&str, &P) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, event: &str, payload: &P) -> HandlerResult {
        self(event, payload)
    }
}

/// A sequential handler with an explicit name.
pub struct NamedHandler<F> {
    name: String,
    handler: F,
}

impl<F> NamedHandler<F> {
    /// Wraps `handler` so it reports `name` in logs and errors.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<P, F> EventHandler<P> for NamedHandler<F>
where
    F: Fn(&str, &P) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, event: &str, payload: &P) -> HandlerResult {
        (self.handler)(event, payload)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handler for the concurrent [`AsyncEventBus`](crate::AsyncEventBus).
///
/// Each invocation runs on its own tokio task, so the payload is shared
/// through an `Arc` rather than borrowed from the publisher.
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use herald_events::{AsyncEventHandler, HandlerResult};
///
/// struct Audit;
///
/// #[async_trait]
/// impl AsyncEventHandler<serde_json::Value> for Audit {
///     async fn handle(&self, event: &str, payload: Arc<serde_json::Value>) -> HandlerResult {
///         tracing::info!(event, %payload, "audited");
///         Ok(())
///     }
///
///     fn name(&self) -> &str { "audit" }
/// }
/// ```
#[async_trait]
pub trait AsyncEventHandler<P>: Send + Sync + 'static {
    /// Handles one published event.
    ///
    /// # Errors
    ///
    /// An error is recorded as a fault of the round; sibling handlers are
    /// unaffected.
    async fn handle(&self, event: &str, payload: Arc<P>) -> HandlerResult;

    /// Name used in logs and errors.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Adapter that turns an async closure into an [`AsyncEventHandler`].
///
/// Built with [`handler_fn`].
pub struct AsyncFnHandler<P, F> {
    name: String,
    func: F,
    _payload: PhantomData<fn(Arc<P>)>,
}

impl<P, F> AsyncFnHandler<P, F> {
    /// Sets the name reported in logs and errors.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Wraps an async closure taking the owned event name and shared payload.
///
/// ```rust
/// use std::sync::Arc;
/// use herald_events::{AsyncEventBus, handler_fn};
///
/// # async fn example() -> herald_events::BusResult<()> {
/// let bus: AsyncEventBus = AsyncEventBus::new();
/// bus.subscribe(
///     "user.login",
///     handler_fn(|event: String, payload: Arc<serde_json::Value>| async move {
///         tracing::info!(%event, %payload, "login");
///         Ok(())
///     }),
/// )?;
/// bus.publish("user.login", serde_json::json!({ "user_id": 123 })).await?;
/// # Ok(())
/// # }
/// ```
pub fn handler_fn<P, F, Fut>(func: F) -> AsyncFnHandler<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(String, Arc<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    AsyncFnHandler {
        name: "anonymous".to_string(),
        func,
        _payload: PhantomData,
    }
}

#[async_trait]
impl<P, F, Fut> AsyncEventHandler<P> for AsyncFnHandler<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(String, Arc<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, event: &str, payload: Arc<P>) -> HandlerResult {
        (self.func)(event.to_string(), payload).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
