//! Dispatch context for correlating the log lines of publish rounds.
//!
//! A publisher creates a [`DispatchContext`] before publishing and enters its
//! span. Every `publish` span the bus opens, and every handler log line, then
//! nests under it and carries the dispatch and correlation ids.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation data for one logical dispatch (one or more publish rounds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchContext {
    /// Unique id of this dispatch.
    pub dispatch_id: Uuid,
    /// Shared by a dispatch and every dispatch it triggers.
    pub correlation_id: Uuid,
    /// The dispatch that triggered this one, if any.
    pub parent_id: Option<Uuid>,
    /// Event being published, when known up front.
    pub event: Option<String>,
    /// When the dispatch started.
    pub started_at: DateTime<Utc>,
    /// Component that publishes.
    pub source: String,
    /// Operation being performed.
    pub operation: Option<String>,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DispatchContext {
    /// Create a root context for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            dispatch_id: id,
            correlation_id: id,
            parent_id: None,
            event: None,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a context for a dispatch triggered from inside this one, e.g. a
    /// handler that publishes a follow-up event.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            dispatch_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.dispatch_id),
            event: None,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            metadata: self.metadata.clone(),
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the event name.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Add metadata.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }

    /// Time since the context was created, in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// Whether this dispatch was triggered by another.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent_id.is_some()
    }

    /// First eight hex digits of the dispatch id.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.dispatch_id.simple().to_string().chars().take(8).collect()
    }

    /// An `info`-level span carrying the correlation fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "dispatch",
            dispatch_id = %self.short_id(),
            correlation_id = %self.correlation_id,
            source = %self.source,
            event = self.event.as_deref(),
            operation = self.operation.as_deref(),
        )
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Keeps a [`DispatchContext`] span entered and logs when the dispatch ends.
///
/// Holds an entered span, so keep it on one thread: use it around
/// synchronous publishes, and `tracing::Instrument` with
/// [`DispatchContext::span`] for async ones.
pub struct DispatchGuard {
    context: DispatchContext,
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl DispatchGuard {
    /// Enter the context's span.
    #[must_use]
    pub fn new(context: DispatchContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("Dispatch started");
        Self { context, span }
    }

    /// The guarded context.
    #[must_use]
    pub fn context(&self) -> &DispatchContext {
        &self.context
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        tracing::debug!(elapsed_ms = self.context.elapsed_ms(), "Dispatch completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_context() {
        let ctx = DispatchContext::new("orders");
        assert_eq!(ctx.source, "orders");
        assert_eq!(ctx.dispatch_id, ctx.correlation_id);
        assert!(!ctx.has_parent());
        assert!(ctx.event.is_none());
    }

    #[test]
    fn test_builder() {
        let correlation = Uuid::new_v4();
        let ctx = DispatchContext::new("orders")
            .with_correlation_id(correlation)
            .with_event("order.created")
            .with_operation("checkout")
            .with_metadata("order_id", "A-1");

        assert_eq!(ctx.correlation_id, correlation);
        assert_eq!(ctx.event.as_deref(), Some("order.created"));
        assert_eq!(ctx.operation.as_deref(), Some("checkout"));
        assert_eq!(ctx.metadata.get("order_id").map(String::as_str), Some("A-1"));
    }

    #[test]
    fn test_child_inherits_correlation() {
        let parent = DispatchContext::new("orders")
            .with_event("order.created")
            .with_metadata("tenant", "acme");
        let child = parent.child("inventory");

        assert_ne!(child.dispatch_id, parent.dispatch_id);
        assert_eq!(child.correlation_id, parent.correlation_id);
        assert_eq!(child.parent_id, Some(parent.dispatch_id));
        assert!(child.event.is_none());
        assert_eq!(child.metadata.get("tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_elapsed() {
        let ctx = DispatchContext::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn test_short_id() {
        let ctx = DispatchContext::new("test");
        let short = ctx.short_id();
        assert_eq!(short.len(), 8);
        assert!(ctx.dispatch_id.simple().to_string().starts_with(&short));
    }

    #[test]
    fn test_guard_exposes_context() {
        let guard = DispatchGuard::new(DispatchContext::new("test").with_event("tick"));
        assert_eq!(guard.context().event.as_deref(), Some("tick"));
    }

    #[test]
    fn test_serialization() {
        let ctx = DispatchContext::new("test")
            .with_event("user.login")
            .with_metadata("key", "value");

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"source\":\"test\""));
        assert!(json.contains("\"event\":\"user.login\""));
        assert!(json.contains(&format!("\"dispatch_id\":\"{}\"", ctx.dispatch_id)));

        let parsed: DispatchContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dispatch_id, ctx.dispatch_id);
        assert_eq!(parsed.event.as_deref(), Some("user.login"));
    }
}
