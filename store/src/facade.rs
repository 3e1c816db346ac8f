//! The dual-mode event store facade.
//!
//! [`EventStore`] is the single choke point all writes and raw reads pass
//! through. At each call it decides between the durable backend and the
//! in-memory fallback buffer, tracks statistics and exposes health status.
//!
//! # Modes
//!
//! The facade runs a small state machine instead of scattering connectivity
//! checks through every method:
//!
//! - **Disabled**: master switch off. Fallback-only; the durable store is
//!   never dialed. Terminal.
//! - **Connected**: the last durable operation (or probe) succeeded.
//! - **Degraded**: the last durable operation (or probe) failed. While
//!   enabled, every append and read still attempts the durable store — the
//!   attempt doubles as the reconnect — so a recovered backend heals the
//!   mode back to Connected without operator action.
//!
//! # The availability-over-durability tradeoff
//!
//! `append_event` **never fails**. When the durable store is unreachable the
//! write lands in a process-local bounded buffer instead and the receipt says
//! so via its `source` field. Callers see success either way, because losing
//! a write is worse than writing to a weaker store. The cost: fallback writes
//! are invisible to other processes, lost on restart and evicted under
//! pressure. Watch `fallback_used` and `health_check()` if that matters to
//! you — it should.
//!
//! # Example
//!
//! ```ignore
//! use eventline_store::{EventStore, StoreConfig};
//!
//! let store = EventStore::new(StoreConfig::from_env(), backend);
//! store.connect().await;
//!
//! let receipt = store
//!     .append_event(
//!         "community".into(),
//!         "community:post_created",
//!         serde_json::json!({ "title": "T" }),
//!         None,
//!     )
//!     .await;
//! assert!(receipt.success);
//! ```

use crate::config::StoreConfig;
use crate::fallback::FallbackBuffer;
use crate::snapshot::{SNAPSHOT_EVENT_TYPE, Snapshot};
use crate::stats::{ConfigSnapshot, StatsSnapshot, StoreStats};
use eventline_core::backend::{EventStream, StoreError, StreamStore};
use eventline_core::event::{EventMetadata, EventRecord, RecordedEvent};
use eventline_core::stream::{EventNumber, ReadOptions, StreamName};
use futures::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Connectivity mode of the facade.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Master switch off; fallback-only, the durable store is never dialed.
    Disabled,
    /// The last durable operation or probe succeeded.
    Connected,
    /// The last durable operation or probe failed; writes degrade to the
    /// fallback buffer until an attempt succeeds again.
    Degraded,
}

/// Which store actually served a write.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteSource {
    /// The durable backing store.
    EventStore,
    /// The process-local in-memory fallback buffer.
    Fallback,
}

impl WriteSource {
    /// Stable string form, as surfaced to callers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventStore => "eventstore",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for WriteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement of an append.
///
/// `success` is always `true`: the facade degrades rather than errors. For
/// durable writes `event_number` is the backend's commit position; for
/// fallback writes it is the buffer's locally-assigned position.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendReceipt {
    /// The appended event's id.
    pub event_id: Uuid,
    /// The stream written to.
    pub stream_name: StreamName,
    /// The event's type tag.
    pub event_type: String,
    /// Commit position (durable) or local buffer position (fallback).
    pub event_number: EventNumber,
    /// Which store served the write.
    pub source: WriteSource,
    /// Always `true`; kept so callers can treat the receipt uniformly.
    pub success: bool,
}

/// Health of the facade, each variant carrying a stats snapshot.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Health {
    /// Feature flag off; fallback always active.
    Disabled {
        /// Current stats snapshot.
        stats: StatsSnapshot,
    },
    /// Durable store reachable, verified with a fresh liveness probe.
    Healthy {
        /// Current stats snapshot.
        stats: StatsSnapshot,
    },
    /// Enabled but not currently connected; writes degrade to the buffer.
    Fallback {
        /// Current stats snapshot.
        stats: StatsSnapshot,
    },
    /// Was connected, but the liveness probe just failed.
    Unhealthy {
        /// The probe failure.
        error: String,
        /// Current stats snapshot.
        stats: StatsSnapshot,
    },
}

impl Health {
    /// Stable string form of the status.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Disabled { .. } => "disabled",
            Self::Healthy { .. } => "healthy",
            Self::Fallback { .. } => "fallback",
            Self::Unhealthy { .. } => "unhealthy",
        }
    }

    /// The stats snapshot carried by every variant.
    #[must_use]
    pub const fn stats(&self) -> &StatsSnapshot {
        match self {
            Self::Disabled { stats }
            | Self::Healthy { stats }
            | Self::Fallback { stats }
            | Self::Unhealthy { stats, .. } => stats,
        }
    }
}

/// Handle on a live stream subscription.
///
/// Dropping the handle (or calling [`Subscription::close`]) closes the
/// underlying subscription.
pub struct Subscription {
    stream: StreamName,
    inner: EventStream,
}

impl Subscription {
    /// The subscribed stream.
    #[must_use]
    pub const fn stream(&self) -> &StreamName {
        &self.stream
    }

    /// Next event from the subscription, or `None` when it ends.
    pub async fn next(&mut self) -> Option<Result<RecordedEvent, StoreError>> {
        self.inner.next().await
    }

    /// Close the subscription.
    pub fn close(self) {
        tracing::debug!(stream = %self.stream, "Subscription closed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

struct FacadeState {
    mode: Mode,
    backend: Option<Arc<dyn StreamStore>>,
}

/// The dual-mode event store facade. See the [module docs](self) for the
/// mode machine and the durability tradeoff.
pub struct EventStore {
    config: StoreConfig,
    state: RwLock<FacadeState>,
    fallback: Mutex<FallbackBuffer>,
    stats: StoreStats,
}

impl EventStore {
    /// Create a facade over the given durable backend.
    ///
    /// Starts Degraded (enabled but unverified) until [`connect`] or a
    /// successful operation establishes connectivity; starts Disabled when
    /// the config's master switch is off.
    ///
    /// [`connect`]: EventStore::connect
    #[must_use]
    pub fn new(config: StoreConfig, backend: Arc<dyn StreamStore>) -> Self {
        let mode = if config.enabled {
            Mode::Degraded
        } else {
            Mode::Disabled
        };
        let fallback = FallbackBuffer::new(config.fallback_capacity);
        Self {
            config,
            state: RwLock::new(FacadeState {
                mode,
                backend: Some(backend),
            }),
            fallback: Mutex::new(fallback),
            stats: StoreStats::default(),
        }
    }

    /// Create a facade with no durable backend at all: fallback-only.
    #[must_use]
    pub fn fallback_only(config: StoreConfig) -> Self {
        let fallback = FallbackBuffer::new(config.fallback_capacity);
        Self {
            config,
            state: RwLock::new(FacadeState {
                mode: Mode::Disabled,
                backend: None,
            }),
            fallback: Mutex::new(fallback),
            stats: StoreStats::default(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current connectivity mode.
    pub async fn mode(&self) -> Mode {
        self.state.read().await.mode
    }

    /// Attempt to establish connectivity, probing the durable store up to
    /// `retry_attempts` times.
    ///
    /// Never fails: connectivity is a soft dependency. On probe failure the
    /// facade stays Degraded (usable via fallback) and the failure is logged
    /// and counted. Safe to call again at any time.
    pub async fn connect(&self) {
        let (mode, backend) = self.current().await;
        if mode == Mode::Disabled {
            tracing::info!("Event store disabled, running fallback-only");
            return;
        }
        let Some(backend) = backend else {
            tracing::warn!("connect called after disconnect; no durable client");
            return;
        };

        let attempts = self.config.retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.bounded(backend.ping()).await {
                Ok(()) => {
                    self.set_mode(Mode::Connected).await;
                    tracing::info!(
                        url = %self.config.connection_string,
                        "Connected to durable event store"
                    );
                    return;
                }
                Err(error) => {
                    self.stats.record_error();
                    tracing::warn!(
                        attempt,
                        attempts,
                        error = %error,
                        "Durable store liveness probe failed"
                    );
                }
            }
        }
    }

    /// Append an event to the named stream.
    ///
    /// Constructs the full event (fresh id, default metadata with timestamp
    /// and correlation id unless supplied), then tries the durable store;
    /// on any failure the write lands in the fallback buffer instead.
    ///
    /// This call **never fails** — check the receipt's `source` to know
    /// which store served it.
    pub async fn append_event(
        &self,
        stream: StreamName,
        event_type: impl Into<String>,
        data: serde_json::Value,
        metadata: Option<EventMetadata>,
    ) -> AppendReceipt {
        let record = match metadata {
            Some(meta) => EventRecord::with_metadata(event_type, data, meta),
            None => EventRecord::new(event_type, data),
        };
        self.append_record(stream, record).await
    }

    async fn append_record(&self, stream: StreamName, record: EventRecord) -> AppendReceipt {
        let (mode, backend) = self.current().await;
        if mode != Mode::Disabled {
            if let Some(backend) = backend {
                match self
                    .bounded(backend.append(stream.clone(), record.clone()))
                    .await
                {
                    Ok(number) => {
                        self.note_success(mode).await;
                        self.stats.record_append();
                        tracing::debug!(
                            stream = %stream,
                            event_type = %record.event_type,
                            number = %number,
                            "Event appended"
                        );
                        return AppendReceipt {
                            event_id: record.id,
                            stream_name: stream,
                            event_type: record.event_type,
                            event_number: number,
                            source: WriteSource::EventStore,
                            success: true,
                        };
                    }
                    Err(error) => {
                        tracing::warn!(
                            stream = %stream,
                            event_type = %record.event_type,
                            error = %error,
                            "Durable append failed, degrading to fallback"
                        );
                        self.note_failure(mode).await;
                    }
                }
            }
        }

        let recorded = {
            let mut buffer = self.fallback.lock().await;
            buffer.push(stream.clone(), record)
        };
        self.stats.record_fallback();
        AppendReceipt {
            event_id: recorded.event_id,
            stream_name: stream,
            event_type: recorded.event_type,
            event_number: recorded.event_number,
            source: WriteSource::Fallback,
            success: true,
        }
    }

    /// Read a page of events from the named stream.
    ///
    /// The durable store honors the starting revision, count limit and
    /// direction. On any durable failure (or while disabled) the read is
    /// served from the fallback buffer, which filters by stream and slices
    /// to the count limit only — it ignores `from` and `direction`. That
    /// asymmetry is deliberate and preserved from the original design.
    pub async fn read_events(
        &self,
        stream: StreamName,
        options: ReadOptions,
    ) -> Vec<RecordedEvent> {
        let max_count = options.max_count.unwrap_or(self.config.batch_size);
        let (mode, backend) = self.current().await;
        if mode != Mode::Disabled {
            if let Some(backend) = backend {
                let paged = ReadOptions {
                    max_count: Some(max_count),
                    ..options
                };
                match self.bounded(backend.read(stream.clone(), paged)).await {
                    Ok(events) => {
                        self.note_success(mode).await;
                        self.stats
                            .record_reads(u64::try_from(events.len()).unwrap_or(u64::MAX));
                        return events;
                    }
                    Err(error) => {
                        tracing::warn!(
                            stream = %stream,
                            error = %error,
                            "Durable read failed, serving from fallback"
                        );
                        self.note_failure(mode).await;
                    }
                }
            }
        }

        let buffer = self.fallback.lock().await;
        buffer.read(&stream, max_count)
    }

    /// Open a live subscription on the named stream.
    ///
    /// Only available while Connected; in Degraded or Disabled mode this
    /// logs a warning and returns `None`. Subscriptions have no fallback —
    /// that is a known capability gap of fallback mode, not an error.
    pub async fn subscribe(
        &self,
        stream: StreamName,
        from: Option<EventNumber>,
    ) -> Option<Subscription> {
        let (mode, backend) = self.current().await;
        if mode != Mode::Connected {
            tracing::warn!(
                stream = %stream,
                mode = ?mode,
                "Subscriptions unavailable while not connected to the durable store"
            );
            return None;
        }
        let backend = backend?;

        match self.bounded(backend.subscribe(stream.clone(), from)).await {
            Ok(inner) => {
                tracing::info!(stream = %stream, "Live subscription opened");
                Some(Subscription { stream, inner })
            }
            Err(error) => {
                tracing::warn!(stream = %stream, error = %error, "Failed to open subscription");
                self.note_failure(mode).await;
                None
            }
        }
    }

    /// Compact an aggregate's history into a snapshot event on the derived
    /// `<stream>-snapshots` stream.
    pub async fn create_snapshot(
        &self,
        stream: &StreamName,
        aggregate_id: impl Into<String>,
        state: serde_json::Value,
        version: u64,
    ) -> AppendReceipt {
        let snapshot = Snapshot::new(aggregate_id, state, version);
        let data = serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null);
        self.append_event(stream.snapshot_stream(), SNAPSHOT_EVENT_TYPE, data, None)
            .await
    }

    /// The latest snapshot for the given aggregate, if the single most
    /// recent snapshot event on the derived stream belongs to it.
    ///
    /// # Design limitation (preserved)
    ///
    /// Only the one most recent snapshot event is inspected, regardless of
    /// which aggregate it belongs to. A snapshot stream shared by several
    /// aggregates will silently miss older snapshots for a
    /// less-recently-snapshotted aggregate. Additionally, when this read is
    /// served from the fallback buffer, "most recent" degrades to "oldest
    /// buffered" because the fallback path ignores read direction.
    pub async fn get_latest_snapshot(
        &self,
        stream: &StreamName,
        aggregate_id: &str,
    ) -> Option<Snapshot> {
        let events = self
            .read_events(stream.snapshot_stream(), ReadOptions::latest())
            .await;
        let event = events.into_iter().next()?;
        if event.event_type != SNAPSHOT_EVENT_TYPE {
            return None;
        }

        match serde_json::from_value::<Snapshot>(event.data) {
            Ok(snapshot) if snapshot.aggregate_id == aggregate_id => Some(snapshot),
            Ok(other) => {
                tracing::debug!(
                    stream = %stream,
                    requested = aggregate_id,
                    found = %other.aggregate_id,
                    "Most recent snapshot belongs to a different aggregate"
                );
                None
            }
            Err(error) => {
                tracing::warn!(stream = %stream, error = %error, "Malformed snapshot event");
                None
            }
        }
    }

    /// Current counters, fallback buffer occupancy and configuration echo.
    pub async fn stats(&self) -> StatsSnapshot {
        let mode = self.mode().await;
        let (fallback_events, fallback_evicted) = {
            let buffer = self.fallback.lock().await;
            (u64::try_from(buffer.len()).unwrap_or(u64::MAX), buffer.evicted())
        };

        StatsSnapshot {
            events_appended: self.stats.events_appended.load(Ordering::Relaxed),
            events_read: self.stats.events_read.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            fallback_used: self.stats.fallback_used.load(Ordering::Relaxed),
            fallback_events,
            fallback_evicted,
            is_connected: mode == Mode::Connected,
            mode,
            config: ConfigSnapshot {
                enabled: self.config.enabled,
                batch_size: self.config.batch_size,
                retry_attempts: self.config.retry_attempts,
                timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
                fallback_capacity: self.config.fallback_capacity,
            },
        }
    }

    /// Probe the durable store and report health.
    ///
    /// - `Disabled`: master switch off
    /// - `Healthy`: fresh liveness probe passed (heals Degraded → Connected)
    /// - `Fallback`: enabled but not connected, probe still failing
    /// - `Unhealthy`: was connected, probe just failed
    pub async fn health_check(&self) -> Health {
        let (mode, backend) = self.current().await;
        if mode == Mode::Disabled {
            return Health::Disabled {
                stats: self.stats().await,
            };
        }
        let Some(backend) = backend else {
            return Health::Fallback {
                stats: self.stats().await,
            };
        };

        match self.bounded(backend.ping()).await {
            Ok(()) => {
                self.note_success(mode).await;
                Health::Healthy {
                    stats: self.stats().await,
                }
            }
            Err(error) => {
                self.stats.record_error();
                self.note_failure(mode).await;
                if mode == Mode::Connected {
                    Health::Unhealthy {
                        error: error.to_string(),
                        stats: self.stats().await,
                    }
                } else {
                    Health::Fallback {
                        stats: self.stats().await,
                    }
                }
            }
        }
    }

    /// Release the durable-store client handle. Idempotent; logs, never
    /// fails. Subsequent operations are served by the fallback buffer.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if state.backend.take().is_some() {
            if state.mode != Mode::Disabled {
                state.mode = Mode::Degraded;
            }
            tracing::info!("Durable store client released");
        } else {
            tracing::debug!("disconnect called with no active client");
        }
    }

    async fn current(&self) -> (Mode, Option<Arc<dyn StreamStore>>) {
        let state = self.state.read().await;
        (state.mode, state.backend.clone())
    }

    async fn set_mode(&self, mode: Mode) {
        self.state.write().await.mode = mode;
    }

    /// A durable operation succeeded; heal Degraded → Connected.
    async fn note_success(&self, observed: Mode) {
        if observed == Mode::Degraded {
            let mut state = self.state.write().await;
            if state.mode == Mode::Degraded {
                tracing::info!("Durable store reachable again, mode DEGRADED -> CONNECTED");
                state.mode = Mode::Connected;
            }
        }
    }

    /// A durable operation failed; Connected → Degraded, count the error.
    async fn note_failure(&self, observed: Mode) {
        self.stats.record_error();
        if observed == Mode::Connected {
            let mut state = self.state.write().await;
            if state.mode == Mode::Connected {
                tracing::warn!("Durable store failure, mode CONNECTED -> DEGRADED");
                state.mode = Mode::Degraded;
            }
        }
    }

    /// Bound a durable-store call by the configured timeout.
    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.timeout)),
        }
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)] // Panics: tests fail loudly on broken fixtures
mod tests {
    use super::*;
    use eventline_core::stream::ReadDirection;
    use eventline_testing::InMemoryStreamStore;

    /// Route facade logs to the test writer; first caller wins, the rest
    /// are no-ops.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .try_init();
    }

    fn config() -> StoreConfig {
        init_tracing();
        StoreConfig::builder()
            .connection_string("mem://test")
            .timeout(std::time::Duration::from_millis(500))
            .build()
    }

    fn store_with_backend() -> (EventStore, Arc<InMemoryStreamStore>) {
        let backend = Arc::new(InMemoryStreamStore::new());
        let store = EventStore::new(config(), backend.clone());
        (store, backend)
    }

    #[tokio::test]
    async fn append_uses_durable_store_when_reachable() {
        let (store, _backend) = store_with_backend();
        store.connect().await;

        let receipt = store
            .append_event(
                "community".into(),
                "community:post_created",
                serde_json::json!({ "title": "T" }),
                None,
            )
            .await;

        assert!(receipt.success);
        assert_eq!(receipt.source, WriteSource::EventStore);
        assert_eq!(store.mode().await, Mode::Connected);
    }

    #[tokio::test]
    async fn append_never_fails_when_store_is_down() {
        let (store, backend) = store_with_backend();
        backend.set_available(false);
        store.connect().await;

        let receipt = store
            .append_event(
                "community".into(),
                "community:post_created",
                serde_json::json!({ "title": "T" }),
                None,
            )
            .await;

        assert!(receipt.success);
        assert_eq!(receipt.source, WriteSource::Fallback);
        assert_eq!(receipt.event_number, EventNumber::new(0));

        let stats = store.stats().await;
        assert_eq!(stats.fallback_used, 1);
        assert_eq!(stats.fallback_events, 1);
        assert!(!stats.is_connected);
    }

    #[tokio::test]
    async fn append_ordering_is_preserved_with_increasing_numbers() {
        let (store, _backend) = store_with_backend();
        store.connect().await;
        let stream = StreamName::new("orders");

        for i in 0..5 {
            store
                .append_event(
                    stream.clone(),
                    "order:placed",
                    serde_json::json!({ "seq": i }),
                    None,
                )
                .await;
        }

        let events = store.read_events(stream, ReadOptions::default()).await;
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.event_number, EventNumber::new(i as u64));
            assert_eq!(event.data["seq"], i);
        }
    }

    #[tokio::test]
    async fn degraded_append_heals_on_recovery() {
        let (store, backend) = store_with_backend();
        backend.set_available(false);
        store.connect().await;

        let first = store
            .append_event("users".into(), "user:created", serde_json::json!({}), None)
            .await;
        assert_eq!(first.source, WriteSource::Fallback);
        assert_eq!(store.mode().await, Mode::Degraded);

        backend.set_available(true);
        let second = store
            .append_event("users".into(), "user:created", serde_json::json!({}), None)
            .await;
        assert_eq!(second.source, WriteSource::EventStore);
        assert_eq!(store.mode().await, Mode::Connected);
    }

    #[tokio::test]
    async fn reads_fall_back_and_ignore_direction() {
        let (store, backend) = store_with_backend();
        backend.set_available(false);
        store.connect().await;

        store
            .append_event("news".into(), "news:article_published", serde_json::json!({ "n": 0 }), None)
            .await;
        store
            .append_event("news".into(), "news:article_published", serde_json::json!({ "n": 1 }), None)
            .await;

        // Backward is requested but the fallback path serves oldest-first.
        let events = store
            .read_events(
                "news".into(),
                ReadOptions::default().direction(ReadDirection::Backward),
            )
            .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data["n"], 0);
        assert_eq!(events[1].data["n"], 1);
    }

    #[tokio::test]
    async fn durable_reads_honor_direction() {
        let (store, _backend) = store_with_backend();
        store.connect().await;

        for n in 0..3 {
            store
                .append_event("news".into(), "news:article_published", serde_json::json!({ "n": n }), None)
                .await;
        }

        let backwards = store
            .read_events(
                "news".into(),
                ReadOptions::default().direction(ReadDirection::Backward),
            )
            .await;
        assert_eq!(backwards[0].data["n"], 2);
        assert_eq!(backwards[2].data["n"], 0);
    }

    #[tokio::test]
    async fn fallback_events_are_process_local() {
        let (store_a, backend) = store_with_backend();
        backend.set_available(false);
        store_a
            .append_event("users".into(), "user:created", serde_json::json!({}), None)
            .await;

        // A fresh facade over the same (still unavailable) backend sees
        // nothing: the fallback buffer is owned per instance.
        let store_b = EventStore::new(config(), backend);
        let events = store_b
            .read_events("users".into(), ReadOptions::default())
            .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn disabled_store_never_dials_the_backend() {
        let backend = Arc::new(InMemoryStreamStore::new());
        let store = EventStore::new(
            StoreConfig::builder().enabled(false).build(),
            backend.clone(),
        );
        store.connect().await;

        let receipt = store
            .append_event("users".into(), "user:created", serde_json::json!({}), None)
            .await;
        assert_eq!(receipt.source, WriteSource::Fallback);
        assert_eq!(store.mode().await, Mode::Disabled);
        assert_eq!(backend.event_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let (store, _backend) = store_with_backend();
        store.connect().await;
        let stream = StreamName::new("orders");

        store
            .create_snapshot(&stream, "agg-1", serde_json::json!({ "foo": 1 }), 3)
            .await;

        let snapshot = store
            .get_latest_snapshot(&stream, "agg-1")
            .await
            .expect("snapshot should be found");
        assert_eq!(snapshot.snapshot, serde_json::json!({ "foo": 1 }));
        assert_eq!(snapshot.version, 3);
    }

    #[tokio::test]
    async fn snapshot_lookup_only_sees_the_most_recent_event() {
        let (store, _backend) = store_with_backend();
        store.connect().await;
        let stream = StreamName::new("orders");

        store
            .create_snapshot(&stream, "agg-1", serde_json::json!({ "foo": 1 }), 1)
            .await;
        store
            .create_snapshot(&stream, "agg-2", serde_json::json!({ "bar": 2 }), 1)
            .await;

        // agg-1's snapshot exists but is shadowed by agg-2's more recent
        // one: the lookup inspects only the single latest snapshot event.
        assert!(store.get_latest_snapshot(&stream, "agg-1").await.is_none());
        assert!(store.get_latest_snapshot(&stream, "agg-2").await.is_some());
    }

    #[tokio::test]
    async fn health_disabled() {
        let store = EventStore::fallback_only(StoreConfig::builder().enabled(false).build());
        let health = store.health_check().await;
        assert_eq!(health.status(), "disabled");
    }

    #[tokio::test]
    async fn health_fallback_when_never_connected() {
        let (store, backend) = store_with_backend();
        backend.set_available(false);
        store.connect().await;

        let health = store.health_check().await;
        assert_eq!(health.status(), "fallback");
    }

    #[tokio::test]
    async fn health_unhealthy_when_probe_fails_while_connected() {
        let (store, backend) = store_with_backend();
        store.connect().await;
        assert_eq!(store.mode().await, Mode::Connected);

        backend.set_available(false);
        let health = store.health_check().await;
        assert_eq!(health.status(), "unhealthy");
        match health {
            Health::Unhealthy { error, .. } => assert!(!error.is_empty()),
            other => panic!("expected unhealthy, got {}", other.status()),
        }
    }

    #[tokio::test]
    async fn health_healthy_heals_degraded_mode() {
        let (store, backend) = store_with_backend();
        backend.set_available(false);
        store.connect().await;
        assert_eq!(store.mode().await, Mode::Degraded);

        backend.set_available(true);
        let health = store.health_check().await;
        assert_eq!(health.status(), "healthy");
        assert_eq!(store.mode().await, Mode::Connected);
        assert!(health.stats().is_connected);
    }

    #[tokio::test]
    async fn subscribe_delivers_new_events() {
        let (store, _backend) = store_with_backend();
        store.connect().await;
        let stream = StreamName::new("chat");

        let mut subscription = store
            .subscribe(stream.clone(), None)
            .await
            .expect("subscription should open while connected");

        store
            .append_event(stream, "chat:message_sent", serde_json::json!({ "text": "hi" }), None)
            .await;

        let event = subscription
            .next()
            .await
            .expect("stream should yield")
            .expect("event should be ok");
        assert_eq!(event.event_type, "chat:message_sent");
        subscription.close();
    }

    #[tokio::test]
    async fn subscribe_unavailable_while_degraded() {
        let (store, backend) = store_with_backend();
        backend.set_available(false);
        store.connect().await;

        assert!(store.subscribe("chat".into(), None).await.is_none());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_degrades_writes() {
        let (store, _backend) = store_with_backend();
        store.connect().await;

        store.disconnect().await;
        store.disconnect().await;

        let receipt = store
            .append_event("users".into(), "user:created", serde_json::json!({}), None)
            .await;
        assert_eq!(receipt.source, WriteSource::Fallback);
    }

    #[tokio::test]
    async fn stats_track_operations() {
        let (store, _backend) = store_with_backend();
        store.connect().await;

        store
            .append_event("users".into(), "user:created", serde_json::json!({}), None)
            .await;
        store
            .read_events("users".into(), ReadOptions::default())
            .await;

        let stats = store.stats().await;
        assert_eq!(stats.events_appended, 1);
        assert_eq!(stats.events_read, 1);
        assert_eq!(stats.fallback_used, 0);
        assert!(stats.is_connected);
        assert_eq!(stats.config.batch_size, 100);
    }
}
