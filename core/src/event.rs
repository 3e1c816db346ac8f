//! Event records and their metadata.
//!
//! An event is an immutable record of something that happened: a type tag,
//! an arbitrary JSON payload and a metadata envelope. [`EventRecord`] is the
//! shape handed to the store for appending; [`RecordedEvent`] is the uniform
//! shape every read path returns, regardless of which backend served it.

use crate::stream::{EventNumber, StreamName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Metadata envelope attached to every event.
///
/// # Fields
///
/// - `timestamp`: when the event was created (set at append time by default)
/// - `source`: optional name of the producing service/component
/// - `correlation_id`: links all events originating from one request;
///   defaults to a fresh UUID when the caller does not supply one
/// - `causation_id`: optionally points at the event that caused this one,
///   forming causal chains
/// - `version`: schema-version tag for the event type
///
/// # Examples
///
/// ```
/// use eventline_core::event::EventMetadata;
///
/// let meta = EventMetadata::new();
/// assert_eq!(meta.version, 1);
/// assert!(meta.causation_id.is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Name of the producing service or component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Links events that originate from the same request.
    pub correlation_id: Uuid,
    /// The event that caused this one, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    /// Schema version of the event type.
    pub version: u32,
}

impl EventMetadata {
    /// Create metadata with defaults: current timestamp, fresh correlation
    /// id, no source, no causation, schema version 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            source: None,
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            version: 1,
        }
    }

    /// Set the producing source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the correlation id, linking this event to an originating request.
    #[must_use]
    pub const fn correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the causation id, pointing at the event that caused this one.
    #[must_use]
    pub const fn causation_id(mut self, id: Uuid) -> Self {
        self.causation_id = Some(id);
        self
    }

    /// Set the schema version of the event type.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable event ready to be appended to a stream.
///
/// Created once by a command handler, appended exactly once to exactly one
/// stream, never mutated or deleted afterwards.
///
/// # Examples
///
/// ```
/// use eventline_core::event::EventRecord;
///
/// let event = EventRecord::new(
///     "community:post_created",
///     serde_json::json!({ "title": "T", "userId": "u1" }),
/// );
/// assert_eq!(event.event_type, "community:post_created");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Globally unique identifier, assigned at creation.
    pub id: Uuid,
    /// String tag identifying the event's meaning, e.g.
    /// `"community:post_created"`.
    pub event_type: String,
    /// Arbitrary JSON payload specific to the event type.
    pub data: serde_json::Value,
    /// Metadata envelope.
    pub metadata: EventMetadata,
}

impl EventRecord {
    /// Create a new event with default metadata.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            data,
            metadata: EventMetadata::new(),
        }
    }

    /// Create a new event with caller-supplied metadata.
    #[must_use]
    pub fn with_metadata(
        event_type: impl Into<String>,
        data: serde_json::Value,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            data,
            metadata,
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventRecord {{ type: {}, id: {} }}", self.event_type, self.id)
    }
}

/// An event as stored in (and read back from) a stream.
///
/// This is the uniform read shape: the durable backend, the in-memory
/// fallback and live subscriptions all deliver events in this form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    /// The event's globally unique identifier.
    pub event_id: Uuid,
    /// String tag identifying the event's meaning.
    pub event_type: String,
    /// JSON payload.
    pub data: serde_json::Value,
    /// Metadata envelope.
    pub metadata: EventMetadata,
    /// The stream that owns this event.
    pub stream_name: StreamName,
    /// Fixed position within the stream.
    pub event_number: EventNumber,
    /// When the event was persisted.
    pub created: DateTime<Utc>,
}

impl RecordedEvent {
    /// Build the stored form of an event at the given position.
    #[must_use]
    pub fn from_record(record: EventRecord, stream_name: StreamName, number: EventNumber) -> Self {
        Self {
            event_id: record.id,
            event_type: record.event_type,
            data: record.data,
            metadata: record.metadata,
            stream_name,
            event_number: number,
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_defaults() {
        let meta = EventMetadata::new();
        assert_eq!(meta.version, 1);
        assert!(meta.source.is_none());
        assert!(meta.causation_id.is_none());
    }

    #[test]
    fn metadata_builder_chain() {
        let cause = Uuid::new_v4();
        let meta = EventMetadata::new()
            .source("community-service")
            .causation_id(cause)
            .version(3);

        assert_eq!(meta.source.as_deref(), Some("community-service"));
        assert_eq!(meta.causation_id, Some(cause));
        assert_eq!(meta.version, 3);
    }

    #[test]
    fn fresh_events_get_distinct_ids_and_correlation() {
        let a = EventRecord::new("user:created", serde_json::json!({}));
        let b = EventRecord::new("user:created", serde_json::json!({}));

        assert_ne!(a.id, b.id);
        assert_ne!(a.metadata.correlation_id, b.metadata.correlation_id);
    }

    #[test]
    fn recorded_event_preserves_record_fields() {
        let record = EventRecord::new(
            "community:post_created",
            serde_json::json!({ "title": "T" }),
        );
        let id = record.id;

        let recorded =
            RecordedEvent::from_record(record, StreamName::new("community"), EventNumber::new(4));

        assert_eq!(recorded.event_id, id);
        assert_eq!(recorded.event_type, "community:post_created");
        assert_eq!(recorded.event_number, EventNumber::new(4));
        assert_eq!(recorded.stream_name.as_str(), "community");
        assert_eq!(recorded.data["title"], "T");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn recorded_event_serializes_camel_case() {
        let record = EventRecord::new("auth:login", serde_json::json!({ "userId": "u1" }));
        let recorded =
            RecordedEvent::from_record(record, StreamName::new("auth"), EventNumber::START);

        let json = serde_json::to_value(&recorded).expect("serialization should succeed");
        assert!(json.get("eventId").is_some());
        assert!(json.get("eventNumber").is_some());
        assert!(json.get("streamName").is_some());
        assert!(json["metadata"].get("correlationId").is_some());
    }
}
