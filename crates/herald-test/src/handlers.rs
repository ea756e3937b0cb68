//! Canned handlers for bus tests.
//!
//! Every handler carries a tag (also its `name()`) and may write to a
//! [`CallJournal`]. Handlers that implement both [`EventHandler`] and
//! [`AsyncEventHandler`] can be subscribed to either bus.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use herald_events::{AsyncEventHandler, EventHandler, HandlerResult};

use crate::journal::CallJournal;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call<P> {
    /// Event name passed to the handler.
    pub event: String,
    /// Payload passed to the handler.
    pub payload: P,
}

/// Handler that records every `(event, payload)` it receives.
///
/// Clones share the recorded calls.
#[derive(Debug)]
pub struct RecordingHandler<P> {
    tag: String,
    journal: CallJournal,
    calls: Arc<Mutex<Vec<Call<P>>>>,
}

impl<P> Clone for RecordingHandler<P> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            journal: self.journal.clone(),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<P: Clone> RecordingHandler<P> {
    /// Create a recorder that also writes enter/exit lines to `journal`.
    #[must_use]
    pub fn new(tag: impl Into<String>, journal: &CallJournal) -> Self {
        Self {
            tag: tag.into(),
            journal: journal.clone(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a recorder with a private journal.
    #[must_use]
    pub fn standalone(tag: impl Into<String>) -> Self {
        Self::new(tag, &CallJournal::new())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call<P>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: &str, payload: &P) {
        self.journal.enter(&self.tag, event);
        self.lock().push(Call {
            event: event.to_string(),
            payload: payload.clone(),
        });
        self.journal.exit(&self.tag, event);
    }

    /// Every recorded call, in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call<P>> {
        self.lock().clone()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    /// The handler's tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl<P> EventHandler<P> for RecordingHandler<P>
where
    P: Clone + Send + Sync + 'static,
{
    fn handle(&self, event: &str, payload: &P) -> HandlerResult {
        self.record(event, payload);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl<P> AsyncEventHandler<P> for RecordingHandler<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn handle(&self, event: &str, payload: Arc<P>) -> HandlerResult {
        self.record(event, &payload);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

/// Handler that always returns an error with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    tag: String,
    message: String,
    journal: CallJournal,
}

impl FailingHandler {
    /// Create a failing handler that journals its calls.
    #[must_use]
    pub fn new(tag: impl Into<String>, message: impl Into<String>, journal: &CallJournal) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
            journal: journal.clone(),
        }
    }

    fn fail(&self, event: &str) -> HandlerResult {
        self.journal.enter(&self.tag, event);
        self.journal.exit(&self.tag, event);
        Err(anyhow::anyhow!("{}", self.message))
    }
}

impl<P> EventHandler<P> for FailingHandler {
    fn handle(&self, event: &str, _payload: &P) -> HandlerResult {
        self.fail(event)
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl<P> AsyncEventHandler<P> for FailingHandler
where
    P: Send + Sync + 'static,
{
    async fn handle(&self, event: &str, _payload: Arc<P>) -> HandlerResult {
        self.fail(event)
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

/// Handler that panics with a fixed message.
#[derive(Debug, Clone)]
pub struct PanickingHandler {
    tag: String,
    message: String,
}

impl PanickingHandler {
    /// Create a panicking handler.
    #[must_use]
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

impl<P> EventHandler<P> for PanickingHandler {
    fn handle(&self, _event: &str, _payload: &P) -> HandlerResult {
        panic!("{}", self.message)
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl<P> AsyncEventHandler<P> for PanickingHandler
where
    P: Send + Sync + 'static,
{
    async fn handle(&self, _event: &str, _payload: Arc<P>) -> HandlerResult {
        panic!("{}", self.message)
    }

    fn name(&self) -> &str {
        &self.tag
    }
}

/// Async handler that sleeps for a fixed delay on the tokio clock.
///
/// Works with a paused test clock, so timing assertions stay
/// deterministic.
#[derive(Debug, Clone)]
pub struct DelayedHandler {
    tag: String,
    delay: Duration,
    journal: CallJournal,
}

impl DelayedHandler {
    /// Create a handler that journals enter, sleeps `delay`, then journals exit.
    #[must_use]
    pub fn new(tag: impl Into<String>, delay: Duration, journal: &CallJournal) -> Self {
        Self {
            tag: tag.into(),
            delay,
            journal: journal.clone(),
        }
    }

    /// The configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl<P> AsyncEventHandler<P> for DelayedHandler
where
    P: Send + Sync + 'static,
{
    async fn handle(&self, event: &str, _payload: Arc<P>) -> HandlerResult {
        self.journal.enter(&self.tag, event);
        tokio::time::sleep(self.delay).await;
        self.journal.exit(&self.tag, event);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.tag
    }
}
