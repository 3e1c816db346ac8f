//! The durable-backend seam: the [`StreamStore`] trait and its errors.
//!
//! The dual-mode facade in `eventline-store` talks to the durable event log
//! exclusively through this trait. Any append-only, stream-oriented store
//! qualifies as a backend: it must be able to append to a named stream, read
//! a revision range in either direction, open a live subscription and answer
//! a cheap liveness probe.
//!
//! # Implementations
//!
//! - `PgStreamStore` (in `eventline-postgres`): production implementation
//! - `InMemoryStreamStore` (in `eventline-testing`): fast, deterministic
//!   testing, with an availability toggle to simulate outages
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn StreamStore>`), which is
//! how the facade holds whatever backend it was constructed with.

use crate::event::{EventRecord, RecordedEvent};
use crate::stream::{EventNumber, ReadOptions, StreamName};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur against a durable stream store.
///
/// The facade catches every variant and converts it into fallback behavior
/// or a degraded health signal; these errors do not escape past it.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to reach the store at all.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The store was reached but the operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An event or its metadata could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The operation exceeded the configured timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A live subscription could not be opened or broke mid-stream.
    #[error("Subscription failed for stream '{stream}': {reason}")]
    SubscriptionFailed {
        /// The stream that failed.
        stream: StreamName,
        /// The reason for failure.
        reason: String,
    },

    /// The requested stream does not exist.
    ///
    /// Most backends treat missing streams as empty instead; this variant
    /// exists for backends that distinguish the two.
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamName),
}

/// Stream of live events from a subscription.
///
/// Each item is a `Result`: an event in the uniform [`RecordedEvent`] shape,
/// or a stream-level error the consumer may log and skip.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RecordedEvent, StoreError>> + Send>>;

/// An append-only, stream-oriented event log.
///
/// # Contract
///
/// - `append` assigns the next [`EventNumber`] for the stream and persists
///   the event at that position; per-stream order is append order.
/// - `read` returns events in the requested direction, honoring the starting
///   revision and count limit; a missing stream reads as empty.
/// - `subscribe` delivers events appended after the subscription point as
///   they arrive.
/// - `ping` is a cheap liveness probe used by the facade's health checks.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the facade shares one instance
/// across all calls.
pub trait StreamStore: Send + Sync {
    /// Append one event to the named stream.
    ///
    /// Returns the position the event was committed at.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ConnectionFailed`]: store unreachable
    /// - [`StoreError::Database`]: persist failed
    /// - [`StoreError::Serialization`]: payload could not be encoded
    fn append(
        &self,
        stream: StreamName,
        event: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<EventNumber, StoreError>> + Send + '_>>;

    /// Read a page of events from the named stream.
    ///
    /// Events come back in the requested direction; a stream that does not
    /// exist reads as an empty page.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ConnectionFailed`]: store unreachable
    /// - [`StoreError::Database`]: query failed
    /// - [`StoreError::Serialization`]: stored payload could not be decoded
    fn read(
        &self,
        stream: StreamName,
        options: ReadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, StoreError>> + Send + '_>>;

    /// Open a live subscription on the named stream.
    ///
    /// Events appended after `from` (exclusive; `None` means "from now") are
    /// delivered in order as they arrive.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SubscriptionFailed`]: subscription could not be opened
    /// - [`StoreError::ConnectionFailed`]: store unreachable
    fn subscribe(
        &self,
        stream: StreamName,
        from: Option<EventNumber>,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, StoreError>> + Send + '_>>;

    /// Cheap liveness probe.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ConnectionFailed`]: store unreachable
    /// - [`StoreError::Database`]: probe query failed
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
