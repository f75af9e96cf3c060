//! Outcome events recorded against an existing assignment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{TestId, VariationId};

/// Unique identifier for an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Create an event ID from an existing value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("evt-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single outcome event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pub test_id: TestId,
    pub user_id: String,
    pub variation_id: VariationId,
    pub metric_name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    /// Position in the owning event log, assigned on append
    #[serde(default)]
    pub sequence: u64,
}

impl Event {
    /// Create a new event with value 1 and no metadata
    pub fn new(
        test_id: TestId,
        user_id: impl Into<String>,
        variation_id: VariationId,
        metric_name: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            test_id,
            user_id: user_id.into(),
            variation_id,
            metric_name: metric_name.into(),
            value: 1.0,
            metadata: Map::new(),
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Whether this event counts toward the given metric
    pub fn is_for_metric(&self, metric_name: &str) -> bool {
        self.metric_name == metric_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event::new(
            TestId::new("exp-1").unwrap(),
            "user-1",
            VariationId::new("control").unwrap(),
            "click",
        )
    }

    #[test]
    fn test_event_defaults() {
        let event = sample_event();

        assert!(event.id().as_str().starts_with("evt-"));
        assert_eq!(event.value, 1.0);
        assert!(event.metadata.is_empty());
        assert!(event.is_for_metric("click"));
        assert!(!event.is_for_metric("purchase"));
    }

    #[test]
    fn test_event_ids_are_unique() {
        assert_ne!(sample_event().id(), sample_event().id());
    }

    #[test]
    fn test_event_builder_chain() {
        let mut metadata = Map::new();
        metadata.insert("channel".to_string(), Value::from("email"));

        let event = sample_event()
            .with_id("evt-fixed")
            .with_value(19.99)
            .with_metadata(metadata);

        assert_eq!(event.id().as_str(), "evt-fixed");
        assert_eq!(event.value, 19.99);
        assert_eq!(event.metadata["channel"], "email");
    }

    #[test]
    fn test_empty_metadata_not_serialized() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        assert!(!json.contains("metadata"));
    }
}
