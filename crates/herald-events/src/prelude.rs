//! Prelude module - commonly used types for convenient import.
//!
//! Use `use herald_events::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use herald_events::prelude::*;
//!
//! # async fn example() -> BusResult<()> {
//! let bus: AsyncEventBus<u64> = AsyncEventBus::new();
//! bus.subscribe(
//!     "tick",
//!     handler_fn(|_event: String, n: Arc<u64>| async move {
//!         tracing::debug!(n = *n, "tick");
//!         Ok(())
//!     }),
//! )?;
//! bus.publish("tick", 1).await?;
//! # Ok(())
//! # }
//! ```

// Buses
pub use crate::{AsyncEventBus, BusConfig, EventBus};

// Handlers
pub use crate::{AsyncEventHandler, EventHandler, HandlerResult, NamedHandler, handler_fn};

// Errors and ids
pub use crate::{BusError, BusResult, FaultKind, HandlerFailure, SubscriptionId};
