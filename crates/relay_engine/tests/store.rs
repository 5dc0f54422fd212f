use std::sync::{Arc, Once};

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use relay_core::{IndividualMessage, ProcessingPhase, TerminateMessage, WebhookMessage};
use relay_engine::{format_timestamp, InMemoryStore, MessageStore};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(relay_logging::initialize_for_tests);
}

fn started(envelope_id: &str) -> WebhookMessage {
    WebhookMessage::Individual(IndividualMessage::Started {
        envelope_id: envelope_id.to_string(),
        total_documents: 3,
        phase: ProcessingPhase::Download,
    })
}

fn terminate() -> WebhookMessage {
    WebhookMessage::Terminate(TerminateMessage {
        terminate: true,
        ..TerminateMessage::default()
    })
}

#[tokio::test]
async fn append_stamps_and_lists_in_order() {
    init_logging();
    let store = InMemoryStore::new();
    let before = Utc::now();

    store.append("acct-1", started("E1").into()).await.unwrap();
    store.append("acct-1", started("E2").into()).await.unwrap();
    store.append("acct-1", terminate().into()).await.unwrap();

    let listed = store.list("acct-1").await.unwrap();
    let messages: Vec<_> = listed.iter().map(|m| m.message.clone()).collect();
    assert_eq!(messages, vec![started("E1"), started("E2"), terminate()]);

    for stored in &listed {
        let stamped = DateTime::parse_from_rfc3339(&stored.timestamp)
            .expect("rfc3339 timestamp")
            .with_timezone(&Utc);
        // Millisecond precision may round the stamp just below `before`.
        assert!(stamped >= before - chrono::Duration::milliseconds(1));
        assert!(stored.timestamp.ends_with('Z'));
    }
}

#[tokio::test]
async fn unknown_accounts_list_empty_and_clear_is_idempotent() {
    init_logging();
    let store = InMemoryStore::new();

    assert!(store.list("nobody").await.unwrap().is_empty());
    store.clear("nobody").await.unwrap();
    store.clear("nobody").await.unwrap();
    assert!(store.list("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_only_touches_one_account() {
    init_logging();
    let store = InMemoryStore::new();
    store.append("a", started("E1").into()).await.unwrap();
    store.append("b", started("E2").into()).await.unwrap();

    store.clear("a").await.unwrap();

    assert!(store.list("a").await.unwrap().is_empty());
    assert_eq!(store.list("b").await.unwrap().len(), 1);
    assert_eq!(store.account_count().await, 2);

    store.append("a", terminate().into()).await.unwrap();
    assert_eq!(store.list("a").await.unwrap().len(), 1);
}

#[tokio::test]
async fn stores_do_not_share_buffers() {
    init_logging();
    let first = InMemoryStore::new();
    let second = InMemoryStore::new();
    first.append("acct", started("E1").into()).await.unwrap();

    assert!(second.list("acct").await.unwrap().is_empty());
}

#[tokio::test]
async fn injected_clock_controls_timestamps() {
    init_logging();
    let fixed = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let store = InMemoryStore::with_clock(Arc::new(move || fixed));

    let stored = store.append("acct", started("E1").into()).await.unwrap();
    assert_eq!(stored.timestamp, "2024-03-01T12:30:00.000Z");
    assert_eq!(format_timestamp(fixed), stored.timestamp);
}
