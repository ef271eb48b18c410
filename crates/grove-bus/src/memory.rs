//! Recording publisher for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use grove_core::error::GroveResult;
use grove_core::events::EventPublisher;

use crate::error::BusError;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Keeps every successfully published event in order. Topics registered
/// with [`MemoryPublisher::fail_on`] are rejected instead.
#[derive(Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<PublishedEvent>>,
    failing_topics: Mutex<HashSet<String>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, topic: &str) {
        if let Ok(mut topics) = self.failing_topics.lock() {
            topics.insert(topic.to_string());
        }
    }

    pub fn recover(&self) {
        if let Ok(mut topics) = self.failing_topics.lock() {
            topics.clear();
        }
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.topic).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventPublisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> GroveResult<()> {
        let failing = self
            .failing_topics
            .lock()
            .map(|topics| topics.contains(topic))
            .unwrap_or(true);
        if failing {
            return Err(BusError::Injected(topic.to_string()).into());
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(PublishedEvent {
                topic: topic.to_string(),
                payload,
            });
        }
        Ok(())
    }
}
