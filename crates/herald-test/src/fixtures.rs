//! Payload fixtures and tracing setup for tests.

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Payload of the canonical login scenario: `{"user_id": 123}`.
#[must_use]
pub fn user_login_payload() -> Value {
    json!({ "user_id": 123 })
}

/// A user lifecycle payload (`user.registered`, `user.login`, `user.logout`).
#[must_use]
pub fn user_payload(user_id: u64, username: &str) -> Value {
    json!({ "user_id": user_id, "username": username })
}

/// An `order.created` payload.
#[must_use]
pub fn order_created_payload() -> Value {
    json!({
        "order_id": 12345,
        "user_id": 789,
        "quantity": 3,
        "amount": 99.99,
    })
}

/// Install a test-writer subscriber once per test binary.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Later calls are no-ops.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shapes() {
        assert_eq!(user_login_payload()["user_id"], 123);
        assert_eq!(user_payload(1, "alice")["username"], "alice");
        assert_eq!(order_created_payload()["quantity"], 3);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
