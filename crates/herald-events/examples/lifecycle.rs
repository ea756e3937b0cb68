//! Event bus walkthrough: order processing, login fan-out, several events
//! sharing a listener, and dynamic unsubscription.
//!
//! ```sh
//! cargo run -p herald-events --example lifecycle
//! RUST_LOG=herald_events=debug cargo run -p herald-events --example lifecycle
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use herald_events::{AsyncEventBus, BusConfig, EventBus, HandlerResult, NamedHandler, handler_fn};
use herald_telemetry::{DispatchContext, DispatchGuard, LogConfig, LogFormat, setup_logging};
use serde_json::{Value, json};
use tracing::{Instrument, info};

fn field<'a>(payload: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    payload
        .get(key)
        .ok_or_else(|| anyhow::anyhow!("payload is missing '{key}'"))
}

fn order_processing() -> anyhow::Result<()> {
    info!("--- sequential bus: order processing ---");
    let bus: EventBus = EventBus::with_config(BusConfig::new("orders"))?;

    bus.subscribe(
        "order.created",
        NamedHandler::new("confirmation-email", |_: &str, order: &Value| -> HandlerResult {
            let order_id = field(order, "order_id")?;
            info!(%order_id, "Sending confirmation email");
            Ok(())
        }),
    )?;
    bus.subscribe(
        "order.created",
        NamedHandler::new("inventory", |_: &str, order: &Value| -> HandlerResult {
            let quantity = field(order, "quantity")?;
            info!(%quantity, "Updating inventory");
            Ok(())
        }),
    )?;
    bus.subscribe(
        "order.created",
        NamedHandler::new("analytics", |_: &str, order: &Value| -> HandlerResult {
            let amount = field(order, "amount")?;
            info!(%amount, "Recording order value");
            Ok(())
        }),
    )?;
    bus.subscribe(
        "order.created",
        NamedHandler::new("warehouse", |_: &str, order: &Value| -> HandlerResult {
            let order_id = field(order, "order_id")?;
            info!(%order_id, "Warehouse notified");
            Ok(())
        }),
    )?;

    let order = json!({ "order_id": 12345, "user_id": 789, "quantity": 3, "amount": 99.99 });
    let _dispatch = DispatchGuard::new(
        DispatchContext::new("checkout")
            .with_event("order.created")
            .with_operation("place_order"),
    );

    let started = Instant::now();
    let dispatched = bus.publish("order.created", &order)?;
    info!(
        dispatched,
        elapsed_us = started.elapsed().as_micros(),
        total = bus.count_subscribers(None),
        "Order handled"
    );
    Ok(())
}

async fn login_fan_out() -> anyhow::Result<()> {
    info!("--- concurrent bus: login fan-out ---");
    let config = BusConfig::new("sessions").with_publish_timeout(Duration::from_secs(2));
    let bus: AsyncEventBus = AsyncEventBus::with_config(config)?;

    let steps = [
        ("fetch-profile", 300),
        ("audit-login", 100),
        ("push-notification", 200),
        ("last-seen", 150),
    ];
    for (name, delay_ms) in steps {
        bus.subscribe(
            "user.login",
            handler_fn(move |_event: String, login: Arc<Value>| async move {
                let user_id = login.get("user_id").cloned().unwrap_or_default();
                info!(step = name, %user_id, "Started");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                info!(step = name, "Finished");
                Ok(())
            })
            .named(name),
        )?;
    }

    let login = json!({ "user_id": 42, "ip_address": "192.168.1.100", "timestamp": "2025-10-11" });
    let ctx = DispatchContext::new("auth").with_event("user.login");

    let started = Instant::now();
    let dispatched = bus
        .publish("user.login", login)
        .instrument(ctx.span())
        .await?;
    info!(
        dispatched,
        elapsed_ms = started.elapsed().as_millis(),
        "Login handled, handlers ran side by side"
    );
    Ok(())
}

fn user_lifecycle() -> anyhow::Result<()> {
    info!("--- sequential bus: several events, one shared listener ---");
    let bus: EventBus = EventBus::new();

    bus.subscribe("user.registered", |_: &str, user: &Value| -> HandlerResult {
        let username = field(user, "username")?;
        info!(%username, "Account created");
        Ok(())
    })?;
    bus.subscribe("user.login", |_: &str, user: &Value| -> HandlerResult {
        let username = field(user, "username")?;
        info!(%username, "Welcome back");
        Ok(())
    })?;
    bus.subscribe("user.logout", |_: &str, user: &Value| -> HandlerResult {
        let username = field(user, "username")?;
        info!(%username, "Goodbye");
        Ok(())
    })?;

    let audit = Arc::new(NamedHandler::new(
        "audit",
        |event: &str, payload: &Value| -> HandlerResult {
            info!(event, %payload, "Audit");
            Ok(())
        },
    ));
    for event in ["user.registered", "user.login", "user.logout"] {
        bus.subscribe_arc(event, Arc::clone(&audit) as _)?;
    }

    let alice = json!({ "user_id": 1, "username": "alice" });
    for event in ["user.registered", "user.login", "user.logout"] {
        bus.publish(event, &alice)?;
    }

    for event in bus.event_names() {
        info!(event, subscribers = bus.count_subscribers(Some(&event)), "Subscribers");
    }
    info!(total = bus.count_subscribers(None), "Subscribers");
    Ok(())
}

fn dynamic_subscriptions() -> anyhow::Result<()> {
    info!("--- sequential bus: dynamic unsubscription ---");
    let bus: EventBus<String> = EventBus::new();

    let temporary = bus.subscribe("notification", |_: &str, msg: &String| -> HandlerResult {
        info!(%msg, "Temporary handler");
        Ok(())
    })?;
    bus.subscribe("notification", |_: &str, msg: &String| -> HandlerResult {
        info!(%msg, "Permanent handler");
        Ok(())
    })?;

    let dispatched = bus.publish("notification", &"first message".to_string())?;
    info!(dispatched, "Both handlers active");

    bus.unsubscribe(temporary)?;
    let dispatched = bus.publish("notification", &"second message".to_string())?;
    info!(dispatched, "Temporary handler removed");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging(
        &LogConfig::new("info")
            .with_format(LogFormat::Compact)
            .without_timestamps(),
    )?;

    order_processing()?;
    user_lifecycle()?;
    dynamic_subscriptions()?;
    login_fan_out().await?;

    info!("Demo complete");
    Ok(())
}
