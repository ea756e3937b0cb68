//! Bus configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, BusResult};

/// Default bus name used in tracing spans.
pub const DEFAULT_BUS_NAME: &str = "herald";

/// Settings shared by [`EventBus`](crate::EventBus) and
/// [`AsyncEventBus`](crate::AsyncEventBus).
///
/// Deserializable so it can be embedded in an application's own config:
///
/// ```rust
/// use herald_events::BusConfig;
///
/// let config: BusConfig = serde_json::from_str(r#"{ "name": "orders", "publish_timeout_ms": 250 }"#).unwrap();
/// assert_eq!(config.publish_timeout().unwrap().as_millis(), 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Label attached to every publish span and log line.
    #[serde(default = "default_name")]
    pub name: String,
    /// Upper bound on a concurrent publish round, in milliseconds.
    ///
    /// Handlers still running when it elapses are aborted and reported as
    /// timed out. Ignored by the sequential bus. `None` waits indefinitely.
    ///
    /// The publisher returns at the deadline either way, but abort only
    /// takes effect at a handler's next `.await`: a handler blocking its
    /// worker thread keeps that thread busy until it returns.
    #[serde(default)]
    pub publish_timeout_ms: Option<u64>,
}

fn default_name() -> String {
    DEFAULT_BUS_NAME.to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            publish_timeout_ms: None,
        }
    }
}

impl BusConfig {
    /// Create a config with the given bus name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the concurrent publish timeout.
    #[must_use]
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The concurrent publish timeout, if any.
    #[must_use]
    pub fn publish_timeout(&self) -> Option<Duration> {
        self.publish_timeout_ms.map(Duration::from_millis)
    }

    /// Check the configuration for values the buses cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`] for a blank name or a zero
    /// timeout.
    pub fn validate(&self) -> BusResult<()> {
        if self.name.trim().is_empty() {
            return Err(BusError::invalid_argument("bus name cannot be empty"));
        }
        if self.publish_timeout_ms == Some(0) {
            return Err(BusError::invalid_argument(
                "publish timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
