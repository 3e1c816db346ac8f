//! In-memory [`StreamStore`] for tests.

use async_stream::stream;
use eventline_core::backend::{EventStream, StoreError, StreamStore};
use eventline_core::event::{EventRecord, RecordedEvent};
use eventline_core::stream::{EventNumber, ReadDirection, ReadOptions, StreamName};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const SUBSCRIPTION_BUFFER: usize = 256;

/// A process-local stream store with an availability toggle.
///
/// Behaves like the durable backend contract demands — per-stream ordered
/// appends, directional reads, live subscriptions — but holds everything in
/// a `HashMap` and can be flipped unavailable to simulate an outage:
///
/// ```
/// use eventline_testing::InMemoryStreamStore;
///
/// let backend = InMemoryStreamStore::new();
/// backend.set_available(false); // every operation now fails
/// backend.set_available(true);  // and recovers
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStreamStore {
    streams: Mutex<HashMap<StreamName, Vec<RecordedEvent>>>,
    senders: Mutex<HashMap<StreamName, broadcast::Sender<RecordedEvent>>>,
    available: AtomicBool,
}

impl InMemoryStreamStore {
    /// Create an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            senders: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability. While unavailable every operation returns
    /// [`StoreError::ConnectionFailed`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Total events across all streams.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.streams
            .lock()
            .map(|streams| streams.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// All events of one stream in append order, for assertions.
    #[must_use]
    pub fn stream_events(&self, stream: &StreamName) -> Vec<RecordedEvent> {
        self.streams
            .lock()
            .map(|streams| streams.get(stream).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::ConnectionFailed("simulated outage".to_string()))
        }
    }

    fn guard<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StoreError> {
        mutex
            .lock()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {e}")))
    }
}

impl StreamStore for InMemoryStreamStore {
    fn append(
        &self,
        stream: StreamName,
        event: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<EventNumber, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;

            let recorded = {
                let mut streams = Self::guard(&self.streams)?;
                let events = streams.entry(stream.clone()).or_default();
                let number = EventNumber::new(u64::try_from(events.len()).unwrap_or(u64::MAX));
                let recorded = RecordedEvent::from_record(event, stream.clone(), number);
                events.push(recorded.clone());
                recorded
            };

            let senders = Self::guard(&self.senders)?;
            if let Some(sender) = senders.get(&stream) {
                // A send error just means no live subscribers.
                let _ = sender.send(recorded.clone());
            }
            Ok(recorded.event_number)
        })
    }

    fn read(
        &self,
        stream: StreamName,
        options: ReadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;

            let streams = Self::guard(&self.streams)?;
            let events = streams.get(&stream).cloned().unwrap_or_default();
            let max_count = options.max_count.unwrap_or(events.len());

            let page: Vec<RecordedEvent> = match options.direction {
                ReadDirection::Forward => {
                    let start = options.from.unwrap_or(EventNumber::START);
                    events
                        .into_iter()
                        .filter(|e| e.event_number >= start)
                        .take(max_count)
                        .collect()
                }
                ReadDirection::Backward => events
                    .into_iter()
                    .rev()
                    .filter(|e| options.from.is_none_or(|from| e.event_number <= from))
                    .take(max_count)
                    .collect(),
            };
            Ok(page)
        })
    }

    fn subscribe(
        &self,
        stream: StreamName,
        from: Option<EventNumber>,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;

            // Receiver first, then the replay snapshot, so an append landing
            // between the two is seen exactly once (replayed or live, with a
            // number filter guarding the overlap).
            let mut receiver = {
                let mut senders = Self::guard(&self.senders)?;
                senders
                    .entry(stream.clone())
                    .or_insert_with(|| broadcast::channel(SUBSCRIPTION_BUFFER).0)
                    .subscribe()
            };
            let replay: Vec<RecordedEvent> = match from {
                Some(from) => {
                    let streams = Self::guard(&self.streams)?;
                    streams
                        .get(&stream)
                        .map(|events| {
                            events
                                .iter()
                                .filter(|e| e.event_number > from)
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default()
                }
                None => Vec::new(),
            };
            let mut last_delivered = replay.last().map(|e| e.event_number).or(from);

            let stream_name = stream;
            let events = stream! {
                for event in replay {
                    yield Ok(event);
                }
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if last_delivered.is_some_and(|last| event.event_number <= last) {
                                continue;
                            }
                            last_delivered = Some(event.event_number);
                            yield Ok(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            yield Err(StoreError::SubscriptionFailed {
                                stream: stream_name.clone(),
                                reason: format!("subscriber lagged, {missed} events dropped"),
                            });
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(events) as EventStream)
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move { self.check_available() })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Panics: tests fail loudly on broken fixtures
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_assigns_sequential_numbers_per_stream() {
        let store = InMemoryStreamStore::new();
        let a = StreamName::new("a");
        let b = StreamName::new("b");

        let n0 = store
            .append(a.clone(), EventRecord::new("t", serde_json::json!({})))
            .await
            .expect("append should succeed");
        let n1 = store
            .append(a.clone(), EventRecord::new("t", serde_json::json!({})))
            .await
            .expect("append should succeed");
        let other = store
            .append(b, EventRecord::new("t", serde_json::json!({})))
            .await
            .expect("append should succeed");

        assert_eq!(n0, EventNumber::new(0));
        assert_eq!(n1, EventNumber::new(1));
        assert_eq!(other, EventNumber::new(0));
        assert_eq!(store.event_count(), 3);
    }

    #[tokio::test]
    async fn read_honors_from_and_direction() {
        let store = InMemoryStreamStore::new();
        let stream = StreamName::new("s");
        for i in 0..5 {
            store
                .append(
                    stream.clone(),
                    EventRecord::new("t", serde_json::json!({ "i": i })),
                )
                .await
                .expect("append should succeed");
        }

        let forward = store
            .read(
                stream.clone(),
                ReadOptions::default().from(EventNumber::new(2)).max_count(2),
            )
            .await
            .expect("read should succeed");
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].event_number, EventNumber::new(2));

        let backward = store
            .read(
                stream,
                ReadOptions::default()
                    .direction(ReadDirection::Backward)
                    .max_count(2),
            )
            .await
            .expect("read should succeed");
        assert_eq!(backward[0].event_number, EventNumber::new(4));
        assert_eq!(backward[1].event_number, EventNumber::new(3));
    }

    #[tokio::test]
    async fn missing_stream_reads_empty() {
        let store = InMemoryStreamStore::new();
        let events = store
            .read(StreamName::new("nope"), ReadOptions::default())
            .await
            .expect("read should succeed");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = InMemoryStreamStore::new();
        store.set_available(false);

        assert!(matches!(
            store.ping().await,
            Err(StoreError::ConnectionFailed(_))
        ));
        assert!(store
            .append(
                StreamName::new("s"),
                EventRecord::new("t", serde_json::json!({}))
            )
            .await
            .is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn subscribe_replays_then_goes_live() {
        use futures::StreamExt;

        let store = InMemoryStreamStore::new();
        let stream = StreamName::new("s");
        for i in 0..3 {
            store
                .append(
                    stream.clone(),
                    EventRecord::new("t", serde_json::json!({ "i": i })),
                )
                .await
                .expect("append should succeed");
        }

        // Replay everything after event 0, then deliver live appends.
        let mut subscription = store
            .subscribe(stream.clone(), Some(EventNumber::new(0)))
            .await
            .expect("subscribe should succeed");

        let first = subscription
            .next()
            .await
            .expect("replay should yield")
            .expect("event should be ok");
        assert_eq!(first.event_number, EventNumber::new(1));
        let second = subscription
            .next()
            .await
            .expect("replay should yield")
            .expect("event should be ok");
        assert_eq!(second.event_number, EventNumber::new(2));

        store
            .append(stream, EventRecord::new("t", serde_json::json!({ "i": 3 })))
            .await
            .expect("append should succeed");
        let live = subscription
            .next()
            .await
            .expect("live event should yield")
            .expect("event should be ok");
        assert_eq!(live.event_number, EventNumber::new(3));
    }

    #[tokio::test]
    async fn subscribe_from_none_is_live_only() {
        use futures::StreamExt;

        let store = InMemoryStreamStore::new();
        let stream = StreamName::new("s");
        store
            .append(stream.clone(), EventRecord::new("t", serde_json::json!({})))
            .await
            .expect("append should succeed");

        let mut subscription = store
            .subscribe(stream.clone(), None)
            .await
            .expect("subscribe should succeed");
        store
            .append(stream, EventRecord::new("t", serde_json::json!({ "live": true })))
            .await
            .expect("append should succeed");

        let event = subscription
            .next()
            .await
            .expect("live event should yield")
            .expect("event should be ok");
        assert_eq!(event.event_number, EventNumber::new(1));
        assert_eq!(event.data["live"], true);
    }
}
