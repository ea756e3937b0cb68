//! Integration tests for the sequential event bus.

use herald_events::{BusError, EventBus, HandlerResult, SubscriptionId};
use herald_test::{
    CallJournal, FailingHandler, RecordingHandler, init_test_tracing, order_created_payload,
    user_login_payload, user_payload,
};
use serde_json::Value;

/// A handler receives the event name and payload exactly once per publish.
#[test]
fn test_login_is_delivered_once() {
    init_test_tracing();
    let bus: EventBus = EventBus::new();
    let log = RecordingHandler::standalone("log");
    bus.subscribe("user.login", log.clone()).unwrap();

    let dispatched = bus.publish("user.login", &user_login_payload()).unwrap();

    assert_eq!(dispatched, 1);
    let calls = log.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].event, "user.login");
    assert_eq!(calls[0].payload, serde_json::json!({ "user_id": 123 }));
}

/// Counting follows subscribe and unsubscribe one for one.
#[test]
fn test_count_tracks_unsubscribe() {
    let bus: EventBus = EventBus::new();
    let first = bus
        .subscribe("order.created", RecordingHandler::standalone("email"))
        .unwrap();
    bus.subscribe("order.created", RecordingHandler::standalone("inventory"))
        .unwrap();
    assert_eq!(bus.count_subscribers(Some("order.created")), 2);

    bus.unsubscribe(first).unwrap();
    assert_eq!(bus.count_subscribers(Some("order.created")), 1);
    assert_eq!(bus.count_subscribers(None), 1);
}

/// Removing an id twice fails the second time, for any interleaving.
#[test]
fn test_unsubscribe_identity_over_many_ids() {
    let bus: EventBus = EventBus::new();
    let events = ["a", "b", "c"];
    let mut ids: Vec<(SubscriptionId, &str)> = Vec::new();
    for round in 0..4 {
        for event in events {
            let tag = format!("{event}{round}");
            ids.push((bus.subscribe(event, RecordingHandler::standalone(tag)).unwrap(), event));
        }
    }

    // Remove in an order unrelated to subscription order.
    ids.reverse();
    ids.rotate_left(5);
    for (id, event) in ids {
        let before = bus.count_subscribers(Some(event));
        let total_before = bus.count_subscribers(None);

        bus.unsubscribe(id).unwrap();

        assert_eq!(bus.count_subscribers(Some(event)), before.saturating_sub(1));
        assert_eq!(bus.count_subscribers(None), total_before.saturating_sub(1));
        let err = bus.unsubscribe(id).unwrap_err();
        assert!(matches!(err, BusError::UnknownSubscription { id: rejected } if rejected == id));
    }

    assert!(bus.is_empty());
    assert!(bus.event_names().is_empty());
}

/// Handlers run one after another, in subscription order.
#[test]
fn test_handlers_run_in_order_without_overlap() {
    let journal = CallJournal::new();
    let bus: EventBus = EventBus::new();
    for tag in ["h1", "h2", "h3"] {
        bus.subscribe("e", RecordingHandler::new(tag, &journal))
            .unwrap();
    }

    assert_eq!(bus.publish("e", &Value::Null).unwrap(), 3);

    assert_eq!(journal.entered(), ["h1", "h2", "h3"]);
    assert!(journal.is_serialized());
}

/// A handler on one event never sees another event.
#[test]
fn test_events_are_isolated() {
    let bus: EventBus = EventBus::new();
    let on_a = RecordingHandler::standalone("a");
    bus.subscribe("a", on_a.clone()).unwrap();

    assert_eq!(bus.publish("b", &Value::Null).unwrap(), 0);
    assert_eq!(on_a.call_count(), 0);
}

/// Publishing to an event nobody listens to is a no-op.
#[test]
fn test_publish_without_subscribers_is_noop() {
    let bus: EventBus = EventBus::new();
    assert_eq!(bus.publish("nobody.listens", &Value::Null).unwrap(), 0);
    assert_eq!(bus.count_subscribers(Some("nobody.listens")), 0);
}

/// An id this bus never issued is rejected.
#[test]
fn test_unsubscribe_foreign_id() {
    let bus: EventBus = EventBus::new();
    let other: EventBus = EventBus::new();
    let foreign = other
        .subscribe("e", |_: &str, _: &Value| -> HandlerResult { Ok(()) })
        .unwrap();

    let err = bus.unsubscribe(foreign).unwrap_err();
    assert!(matches!(err, BusError::UnknownSubscription { .. }));

    let forged: SubscriptionId = format!("{}#1", uuid::Uuid::new_v4()).parse().unwrap();
    let err = bus.unsubscribe(forged).unwrap_err();
    assert!(matches!(err, BusError::UnknownSubscription { .. }));
}

/// A blank event name is rejected before the registry changes.
#[test]
fn test_blank_event_leaves_registry_untouched() {
    let bus: EventBus = EventBus::new();
    bus.subscribe("e", RecordingHandler::standalone("h")).unwrap();

    for bad in ["", "  "] {
        let err = bus
            .subscribe(bad, RecordingHandler::standalone("h"))
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidArgument { .. }));
    }
    assert_eq!(bus.count_subscribers(None), 1);

    let err = "".parse::<SubscriptionId>().unwrap_err();
    assert!(matches!(err, BusError::InvalidArgument { .. }));
}

/// The first failure stops the round and reaches the publisher.
#[test]
fn test_failure_aborts_remaining_handlers() {
    let journal = CallJournal::new();
    let bus: EventBus = EventBus::new();
    let before = RecordingHandler::new("before", &journal);
    let after = RecordingHandler::new("after", &journal);

    bus.subscribe("order.created", before.clone()).unwrap();
    let failing = bus
        .subscribe(
            "order.created",
            FailingHandler::new("payment", "card declined", &journal),
        )
        .unwrap();
    bus.subscribe("order.created", after.clone()).unwrap();

    let err = bus
        .publish("order.created", &order_created_payload())
        .unwrap_err();

    match err {
        BusError::Handler {
            event,
            subscription,
            handler,
            source,
        } => {
            assert_eq!(event, "order.created");
            assert_eq!(subscription, failing);
            assert_eq!(handler, "payment");
            assert_eq!(source.to_string(), "card declined");
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(before.call_count(), 1);
    assert_eq!(after.call_count(), 0);
    assert_eq!(journal.entered(), ["before", "payment"]);

    // Subscriptions survive a failed round.
    assert_eq!(bus.count_subscribers(Some("order.created")), 3);
}

/// One handler may listen to several events of a user lifecycle.
#[test]
fn test_shared_listener_across_events() {
    let bus: EventBus = EventBus::new();
    let audit = RecordingHandler::standalone("audit");
    let welcome = RecordingHandler::standalone("welcome");

    bus.subscribe("user.registered", welcome.clone()).unwrap();
    for event in ["user.registered", "user.login", "user.logout"] {
        bus.subscribe(event, audit.clone()).unwrap();
    }

    for event in ["user.registered", "user.login", "user.logout"] {
        bus.publish(event, &user_payload(1, "alice")).unwrap();
    }

    let seen: Vec<String> = audit.calls().into_iter().map(|c| c.event).collect();
    assert_eq!(seen, ["user.registered", "user.login", "user.logout"]);
    assert_eq!(welcome.call_count(), 1);
    assert_eq!(bus.count_subscribers(None), 4);
    assert_eq!(
        bus.event_names(),
        ["user.login", "user.logout", "user.registered"]
    );
}

/// `clear` removes everything but the bus keeps working.
#[test]
fn test_clear_then_reuse() {
    let bus: EventBus = EventBus::new();
    let id = bus.subscribe("e", RecordingHandler::standalone("h")).unwrap();
    bus.subscribe("f", RecordingHandler::standalone("h")).unwrap();

    bus.clear();
    assert_eq!(bus.count_subscribers(None), 0);
    assert!(bus.unsubscribe(id).is_err());

    let fresh = RecordingHandler::standalone("fresh");
    bus.subscribe("e", fresh.clone()).unwrap();
    assert_eq!(bus.publish("e", &Value::Null).unwrap(), 1);
    assert_eq!(fresh.call_count(), 1);
}
