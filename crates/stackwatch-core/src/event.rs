//! Stack events: the raw adapter payload and the translated record delivered to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One state transition of one provisioned resource, as delivered to subscribers.
///
/// The event id is not part of the record; the streamer tracks it separately for dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub logical_resource_id: String,
    pub resource_type: String,
    pub resource_status: String,
    /// Empty when the source gave no reason.
    #[serde(default)]
    pub resource_status_reason: String,
}

impl StackEvent {
    /// Human-readable reason, if the source provided a non-empty one.
    pub fn reason(&self) -> Option<&str> {
        if self.resource_status_reason.is_empty() {
            None
        } else {
            Some(&self.resource_status_reason)
        }
    }
}

/// Event as returned by a [`crate::source::StackEventsDescriber`]. Every string field may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStackEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub logical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_status: Option<String>,
    #[serde(default)]
    pub resource_status_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RawStackEvent {
    pub fn new(
        event_id: impl Into<String>,
        logical_resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_status: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Some(event_id.into()),
            logical_resource_id: Some(logical_resource_id.into()),
            resource_type: Some(resource_type.into()),
            resource_status: Some(resource_status.into()),
            resource_status_reason: None,
            timestamp,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.resource_status_reason = Some(reason.into());
        self
    }

    /// Dedup key. A missing id maps to the empty string.
    pub fn id(&self) -> &str {
        self.event_id.as_deref().unwrap_or_default()
    }
}

impl From<&RawStackEvent> for StackEvent {
    fn from(raw: &RawStackEvent) -> Self {
        Self {
            logical_resource_id: raw.logical_resource_id.clone().unwrap_or_default(),
            resource_type: raw.resource_type.clone().unwrap_or_default(),
            resource_status: raw.resource_status.clone().unwrap_or_default(),
            resource_status_reason: raw.resource_status_reason.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn translation_degrades_missing_fields_to_empty() {
        let raw = RawStackEvent {
            event_id: None,
            logical_resource_id: None,
            resource_type: Some("AWS::ECS::Service".into()),
            resource_status: None,
            resource_status_reason: None,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        let event = StackEvent::from(&raw);
        assert_eq!(event.logical_resource_id, "");
        assert_eq!(event.resource_type, "AWS::ECS::Service");
        assert_eq!(event.resource_status, "");
        assert_eq!(event.reason(), None);
        assert_eq!(raw.id(), "");
    }

    #[test]
    fn reason_is_exposed_when_present() {
        let raw = RawStackEvent::new(
            "e1",
            "Service",
            "AWS::ECS::Service",
            "CREATE_FAILED",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
        .with_reason("Resource creation cancelled");
        let event = StackEvent::from(&raw);
        assert_eq!(event.reason(), Some("Resource creation cancelled"));
    }

    #[test]
    fn raw_event_parses_with_missing_optional_fields() {
        let raw: RawStackEvent = serde_json::from_str(
            r#"{"event_id":"e1","resource_status":"CREATE_COMPLETE","timestamp":"2026-01-01T00:00:05Z"}"#,
        )
        .unwrap();
        assert_eq!(raw.id(), "e1");
        assert_eq!(raw.logical_resource_id, None);
        assert_eq!(StackEvent::from(&raw).resource_status, "CREATE_COMPLETE");
    }
}
