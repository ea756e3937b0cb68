//! Herald Events - In-process publish/subscribe event bus.
//!
//! This crate provides:
//! - A subscription registry keyed by event name, preserving subscription order
//! - [`EventBus`]: sequential dispatch on the publisher's thread
//! - [`AsyncEventBus`]: concurrent fan-out on tokio tasks with isolated failures
//! - Handler contracts for both variants
//!
//! # Architecture
//!
//! Both buses share the same registry model and differ only in how
//! `publish` runs the handlers of one round:
//!
//! 1. **Sequential**: handlers run one at a time, in subscription order. The
//!    first failure aborts the round and is returned to the publisher.
//!
//! 2. **Concurrent**: every handler runs on its own task. The publisher waits
//!    for all of them and receives one aggregate error listing every fault.
//!
//! Each round works on a snapshot of the subscriber list, so handlers may
//! subscribe, unsubscribe or publish on the bus that invokes them.
//!
//! There is no global bus. Construct one and pass it (or a clone, which
//! shares the registry) to whoever needs it.
//!
//! # Example
//!
//! ```rust
//! use herald_events::{EventBus, HandlerResult};
//! use serde_json::{Value, json};
//!
//! let bus: EventBus = EventBus::new();
//!
//! let id = bus
//!     .subscribe("user.login", |event: &str, payload: &Value| -> HandlerResult {
//!         tracing::info!(event, %payload, "user logged in");
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(bus.publish("user.login", &json!({ "user_id": 123 })).unwrap(), 1);
//! assert_eq!(bus.count_subscribers(Some("user.login")), 1);
//!
//! bus.unsubscribe(id).unwrap();
//! assert!(bus.unsubscribe(id).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod async_bus;
mod bus;
mod config;
mod error;
mod handler;
mod id;
mod registry;

pub use async_bus::AsyncEventBus;
pub use bus::EventBus;
pub use config::{BusConfig, DEFAULT_BUS_NAME};
pub use error::{BusError, BusResult, FaultKind, HandlerFailure, HandlerFault};
pub use handler::{
    AsyncEventHandler, AsyncFnHandler, EventHandler, HandlerResult, NamedHandler, handler_fn,
};
pub use id::SubscriptionId;
