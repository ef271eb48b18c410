//! Integration tests for the recording publisher.

use grove_bus::MemoryPublisher;
use grove_core::error::GroveError;
use grove_core::events::EventPublisher;
use serde_json::json;

#[tokio::test]
async fn records_events_in_order() {
    let publisher = MemoryPublisher::new();
    publisher.publish("a", json!({ "n": 1 })).await.unwrap();
    publisher.publish("b", json!({ "n": 2 })).await.unwrap();

    assert_eq!(publisher.topics(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(publisher.events()[1].payload["n"], 2);
}

#[tokio::test]
async fn injected_failure_is_a_publish_error() {
    let publisher = MemoryPublisher::new();
    publisher.fail_on("groups.notification.member.add");

    let err = publisher
        .publish("groups.notification.member.add", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Publish(_)));
    assert!(publisher.events().is_empty());

    publisher.recover();
    publisher
        .publish("groups.notification.member.add", json!({}))
        .await
        .unwrap();
    assert_eq!(publisher.events().len(), 1);
}
