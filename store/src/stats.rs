//! Process-local facade statistics.
//!
//! Counters are incremented on every facade operation and reset only on
//! process restart. They feed health reporting and dashboards; they are not
//! used for correctness.

use crate::facade::Mode;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by the facade.
#[derive(Debug, Default)]
pub struct StoreStats {
    pub(crate) events_appended: AtomicU64,
    pub(crate) events_read: AtomicU64,
    pub(crate) errors: AtomicU64,
    pub(crate) fallback_used: AtomicU64,
}

impl StoreStats {
    pub(crate) fn record_append(&self) {
        self.events_appended.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("event_store.events_appended").increment(1);
    }

    pub(crate) fn record_reads(&self, count: u64) {
        self.events_read.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("event_store.events_read").increment(count);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("event_store.errors").increment(1);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallback_used.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("event_store.fallback_writes").increment(1);
    }
}

/// Point-in-time view of the facade's counters, fallback buffer and active
/// configuration. Serializable for dashboards and health endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Events successfully appended to the durable store.
    pub events_appended: u64,
    /// Events read from the durable store.
    pub events_read: u64,
    /// Durable-store failures observed (connect, append, read, probe).
    pub errors: u64,
    /// Writes that degraded to the in-memory fallback.
    pub fallback_used: u64,
    /// Events currently held in the fallback buffer.
    pub fallback_events: u64,
    /// Fallback events lost to eviction since startup.
    pub fallback_evicted: u64,
    /// Whether the durable store was reachable at the last operation.
    pub is_connected: bool,
    /// The facade's current connectivity mode.
    pub mode: Mode,
    /// Active configuration echo.
    pub config: ConfigSnapshot,
}

/// The configuration values relevant to operators, echoed into stats.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Master switch state.
    pub enabled: bool,
    /// Default read page size.
    pub batch_size: usize,
    /// Connect-probe retry attempts.
    pub retry_attempts: u32,
    /// Per-operation timeout in milliseconds.
    pub timeout_ms: u64,
    /// Fallback buffer capacity.
    pub fallback_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StoreStats::default();
        stats.record_append();
        stats.record_append();
        stats.record_reads(5);
        stats.record_error();
        stats.record_fallback();

        assert_eq!(stats.events_appended.load(Ordering::Relaxed), 2);
        assert_eq!(stats.events_read.load(Ordering::Relaxed), 5);
        assert_eq!(stats.errors.load(Ordering::Relaxed), 1);
        assert_eq!(stats.fallback_used.load(Ordering::Relaxed), 1);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn snapshot_serializes_camel_case() {
        let snapshot = StatsSnapshot {
            events_appended: 1,
            events_read: 2,
            errors: 0,
            fallback_used: 0,
            fallback_events: 0,
            fallback_evicted: 0,
            is_connected: true,
            mode: Mode::Connected,
            config: ConfigSnapshot {
                enabled: true,
                batch_size: 100,
                retry_attempts: 3,
                timeout_ms: 5000,
                fallback_capacity: 10_000,
            },
        };

        let json = serde_json::to_value(&snapshot).expect("serialization should succeed");
        assert_eq!(json["eventsAppended"], 1);
        assert_eq!(json["isConnected"], true);
        assert_eq!(json["mode"], "connected");
        assert_eq!(json["config"]["batchSize"], 100);
    }
}
