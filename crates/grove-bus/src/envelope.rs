//! Wire format of events sent to the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub topic: String,
    pub originator: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(topic: &str, originator: &str, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.to_string(),
            originator: originator.to_string(),
            timestamp: Utc::now(),
            mime_type: JSON_MIME_TYPE.to_string(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_bus_field_names() {
        let envelope = EventEnvelope::new(
            "groups.notification.create",
            "grove-groups-api",
            serde_json::json!({ "name": "Developers" }),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["mime-type"], "application/json");
        assert_eq!(json["originator"], "grove-groups-api");
        assert_eq!(json["payload"]["name"], "Developers");
        assert!(json["timestamp"].is_string());
    }
}
