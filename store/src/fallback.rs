//! Bounded in-memory fallback buffer.
//!
//! When the durable store is unreachable the facade appends here instead.
//! The buffer is a capped FIFO ring owned by the facade instance: once full,
//! the oldest event is evicted for each new one and an eviction counter is
//! bumped so operators can see data loss in the stats.
//!
//! Everything in this buffer is process-local. Concurrent processes each have
//! their own buffer, so fallback-mode writes are **not** visible across
//! processes and are lost on restart. That consistency gap is the price of
//! the facade's never-fail append guarantee.

use eventline_core::event::{EventRecord, RecordedEvent};
use eventline_core::stream::{EventNumber, StreamName};
use std::collections::VecDeque;

/// Capped, append-only, process-local event list.
///
/// Event numbers are assigned from a monotonic counter, so they keep
/// strictly increasing even after eviction starts (until the first eviction
/// the number equals the buffer length, matching a plain unbounded list).
#[derive(Debug)]
pub struct FallbackBuffer {
    events: VecDeque<RecordedEvent>,
    capacity: usize,
    next_number: u64,
    evicted: u64,
}

impl FallbackBuffer {
    /// Create a buffer holding at most `capacity` events.
    ///
    /// A capacity of zero is treated as one: the buffer always retains at
    /// least the most recent fallback write.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            next_number: 0,
            evicted: 0,
        }
    }

    /// Append an event for the given stream, assigning its local position
    /// and created timestamp. Evicts the oldest event when full.
    pub fn push(&mut self, stream: StreamName, record: EventRecord) -> RecordedEvent {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }

        let recorded =
            RecordedEvent::from_record(record, stream, EventNumber::new(self.next_number));
        self.next_number += 1;
        self.events.push_back(recorded.clone());
        recorded
    }

    /// Events belonging to the given stream, oldest first, up to `max_count`.
    ///
    /// This is the whole fallback read path: it ignores the requested read
    /// direction and starting revision, an acknowledged asymmetry with the
    /// durable path.
    #[must_use]
    pub fn read(&self, stream: &StreamName, max_count: usize) -> Vec<RecordedEvent> {
        self.events
            .iter()
            .filter(|event| &event.stream_name == stream)
            .take(max_count)
            .cloned()
            .collect()
    }

    /// Number of events currently buffered (across all streams).
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events evicted since the buffer was created.
    #[must_use]
    pub const fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event_type: &str) -> EventRecord {
        EventRecord::new(event_type, serde_json::json!({ "k": event_type }))
    }

    #[test]
    fn push_assigns_increasing_numbers() {
        let mut buffer = FallbackBuffer::new(10);
        let stream = StreamName::new("community");

        let a = buffer.push(stream.clone(), record("community:post_created"));
        let b = buffer.push(stream.clone(), record("community:post_updated"));
        let c = buffer.push(stream, record("community:post_deleted"));

        assert_eq!(a.event_number, EventNumber::new(0));
        assert_eq!(b.event_number, EventNumber::new(1));
        assert_eq!(c.event_number, EventNumber::new(2));
    }

    #[test]
    fn read_filters_by_stream() {
        let mut buffer = FallbackBuffer::new(10);
        buffer.push(StreamName::new("users"), record("user:created"));
        buffer.push(StreamName::new("community"), record("community:post_created"));
        buffer.push(StreamName::new("users"), record("user:profile_updated"));

        let users = buffer.read(&StreamName::new("users"), 100);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].event_type, "user:created");
        assert_eq!(users[1].event_type, "user:profile_updated");
    }

    #[test]
    fn read_respects_max_count() {
        let mut buffer = FallbackBuffer::new(10);
        let stream = StreamName::new("news");
        for _ in 0..5 {
            buffer.push(stream.clone(), record("news:article_published"));
        }

        assert_eq!(buffer.read(&stream, 3).len(), 3);
    }

    #[test]
    fn eviction_drops_oldest_and_counts() {
        let mut buffer = FallbackBuffer::new(2);
        let stream = StreamName::new("system");

        buffer.push(stream.clone(), record("system:alert_created"));
        buffer.push(stream.clone(), record("system:alert_created"));
        buffer.push(stream.clone(), record("system:alert_created"));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.evicted(), 1);

        // Numbers stay monotonic after eviction.
        let remaining = buffer.read(&stream, 10);
        assert_eq!(remaining[0].event_number, EventNumber::new(1));
        assert_eq!(remaining[1].event_number, EventNumber::new(2));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut buffer = FallbackBuffer::new(0);
        let stream = StreamName::new("admin");
        buffer.push(stream.clone(), record("admin:action_performed"));
        assert_eq!(buffer.len(), 1);
        buffer.push(stream, record("admin:action_performed"));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.evicted(), 1);
    }
}
