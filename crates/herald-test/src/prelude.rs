//! Prelude module - commonly used test utilities.
//!
//! Use `use herald_test::prelude::*;` in test modules.

pub use crate::fixtures::{
    init_test_tracing, order_created_payload, user_login_payload, user_payload,
};
pub use crate::handlers::{DelayedHandler, FailingHandler, PanickingHandler, RecordingHandler};
pub use crate::journal::{CallJournal, JournalEntry, Phase};
