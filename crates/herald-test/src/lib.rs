//! Herald Test - Shared test utilities for the Herald event bus.
//!
//! This crate provides handlers that record, fail, panic or sleep, an
//! append-only [`CallJournal`] to assert on invocation order, and payload
//! fixtures. It is meant to be used as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! herald-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use herald_events::EventBus;
//! use herald_test::{CallJournal, RecordingHandler, user_login_payload};
//!
//! #[test]
//! fn test_login_is_recorded() {
//!     let journal = CallJournal::new();
//!     let handler = RecordingHandler::new("log", &journal);
//!
//!     let bus = EventBus::new();
//!     bus.subscribe("user.login", handler.clone()).unwrap();
//!     bus.publish("user.login", &user_login_payload()).unwrap();
//!
//!     assert_eq!(handler.call_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod handlers;
pub mod journal;

pub use fixtures::*;
pub use handlers::*;
pub use journal::*;
