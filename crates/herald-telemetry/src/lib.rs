//! Herald Telemetry - Logging and dispatch correlation for the Herald event bus.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats and rolling files
//! - Dispatch context for correlating the log lines of publish rounds
//! - Integration with the tracing ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use herald_telemetry::{DispatchContext, LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), herald_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("herald_events=debug");
//!
//! setup_logging(&config)?;
//!
//! let ctx = DispatchContext::new("checkout").with_event("order.created");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("Publishing order");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{DispatchContext, DispatchGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
