//! The `PostgreSQL` [`StreamStore`] implementation.

use async_stream::stream;
use chrono::{DateTime, Utc};
use eventline_core::backend::{EventStream, StoreError, StreamStore};
use eventline_core::event::{EventMetadata, EventRecord, RecordedEvent};
use eventline_core::stream::{EventNumber, ReadDirection, ReadOptions, StreamName};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SUBSCRIPTION_PAGE: usize = 100;

/// `PostgreSQL`-backed event log.
///
/// Events live in the `stream_events` table, keyed by
/// `(stream_name, event_number)`. Appends run in a transaction that computes
/// the stream's next number; subscriptions poll the table at a fixed
/// interval rather than using `LISTEN/NOTIFY`, which keeps them correct
/// across connection drops at the cost of up to one poll interval of
/// latency.
///
/// # Example
///
/// ```ignore
/// use eventline_postgres::PgStreamStore;
///
/// let store = PgStreamStore::connect("postgres://localhost/eventline").await?;
/// eventline_postgres::schema::run_migrations(store.pool()).await?;
/// ```
#[derive(Clone, Debug)]
pub struct PgStreamStore {
    pool: PgPool,
    poll_interval: Duration,
}

impl PgStreamStore {
    /// Connect to the database and build a store with default pooling.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the pool cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self::from_pool(pool))
    }

    /// Build a store over an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the subscription poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The underlying connection pool, for migrations and admin queries.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Highest committed event number of a stream, if any events exist.
    async fn head(&self, stream: &StreamName) -> Result<Option<EventNumber>, StoreError> {
        let row = sqlx::query(
            "SELECT MAX(event_number) AS head FROM stream_events WHERE stream_name = $1",
        )
        .bind(stream.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let head: Option<i64> = row.try_get("head").map_err(map_sqlx)?;
        head.map(to_event_number).transpose()
    }

    async fn read_page(
        &self,
        stream: &StreamName,
        options: &ReadOptions,
        max_count: usize,
    ) -> Result<Vec<RecordedEvent>, StoreError> {
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);
        let rows = match options.direction {
            ReadDirection::Forward => {
                let from = options
                    .from
                    .map_or(0, |n| i64::try_from(n.value()).unwrap_or(i64::MAX));
                sqlx::query(
                    r"
                    SELECT stream_name, event_number, event_id, event_type, data, metadata, created
                    FROM stream_events
                    WHERE stream_name = $1 AND event_number >= $2
                    ORDER BY event_number ASC
                    LIMIT $3
                    ",
                )
                .bind(stream.as_str())
                .bind(from)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            ReadDirection::Backward => {
                let from = options
                    .from
                    .map_or(i64::MAX, |n| i64::try_from(n.value()).unwrap_or(i64::MAX));
                sqlx::query(
                    r"
                    SELECT stream_name, event_number, event_id, event_type, data, metadata, created
                    FROM stream_events
                    WHERE stream_name = $1 AND event_number <= $2
                    ORDER BY event_number DESC
                    LIMIT $3
                    ",
                )
                .bind(stream.as_str())
                .bind(from)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx)?;

        rows.into_iter().map(row_to_event).collect()
    }
}

fn map_sqlx(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Io(e) => StoreError::ConnectionFailed(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::ConnectionFailed(error.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

fn to_event_number(raw: i64) -> Result<EventNumber, StoreError> {
    u64::try_from(raw)
        .map(EventNumber::new)
        .map_err(|_| StoreError::Database(format!("negative event number: {raw}")))
}

fn row_to_event(row: PgRow) -> Result<RecordedEvent, StoreError> {
    let stream_name: String = row.try_get("stream_name").map_err(map_sqlx)?;
    let raw_number: i64 = row.try_get("event_number").map_err(map_sqlx)?;
    let event_id: Uuid = row.try_get("event_id").map_err(map_sqlx)?;
    let event_type: String = row.try_get("event_type").map_err(map_sqlx)?;
    let data: serde_json::Value = row.try_get("data").map_err(map_sqlx)?;
    let metadata: serde_json::Value = row.try_get("metadata").map_err(map_sqlx)?;
    let created: DateTime<Utc> = row.try_get("created").map_err(map_sqlx)?;

    let metadata: EventMetadata = serde_json::from_value(metadata)
        .map_err(|e| StoreError::Serialization(format!("stored metadata: {e}")))?;

    Ok(RecordedEvent {
        event_id,
        event_type,
        data,
        metadata,
        stream_name: StreamName::new(stream_name),
        event_number: to_event_number(raw_number)?,
        created,
    })
}

impl StreamStore for PgStreamStore {
    fn append(
        &self,
        stream: StreamName,
        event: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<EventNumber, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let metadata = serde_json::to_value(&event.metadata)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            // The transaction serializes concurrent appends to one stream:
            // a losing writer hits the primary key and the caller retries
            // through the facade's degradation path.
            let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
            let row = sqlx::query(
                r"
                SELECT COALESCE(MAX(event_number) + 1, 0) AS next
                FROM stream_events
                WHERE stream_name = $1
                ",
            )
            .bind(stream.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            let next: i64 = row.try_get("next").map_err(map_sqlx)?;

            sqlx::query(
                r"
                INSERT INTO stream_events
                    (stream_name, event_number, event_id, event_type, data, metadata, created)
                VALUES ($1, $2, $3, $4, $5, $6, now())
                ",
            )
            .bind(stream.as_str())
            .bind(next)
            .bind(event.id)
            .bind(&event.event_type)
            .bind(&event.data)
            .bind(&metadata)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            tx.commit().await.map_err(map_sqlx)?;

            let number = to_event_number(next)?;
            tracing::debug!(
                stream = %stream,
                event_type = %event.event_type,
                number = %number,
                "Event persisted"
            );
            Ok(number)
        })
    }

    fn read(
        &self,
        stream: StreamName,
        options: ReadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let max_count = options.max_count.unwrap_or(usize::MAX);
            self.read_page(&stream, &options, max_count).await
        })
    }

    fn subscribe(
        &self,
        stream: StreamName,
        from: Option<EventNumber>,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, StoreError>> + Send + '_>> {
        Box::pin(async move {
            // `from` is exclusive; None means "events appended from now on".
            let mut next = match from {
                Some(from) => from.next(),
                None => self
                    .head(&stream)
                    .await?
                    .map_or(EventNumber::START, EventNumber::next),
            };

            let store = self.clone();
            let events = stream! {
                loop {
                    let options = ReadOptions::default().from(next);
                    match store.read_page(&stream, &options, SUBSCRIPTION_PAGE).await {
                        Ok(page) if page.is_empty() => {
                            tokio::time::sleep(store.poll_interval).await;
                        }
                        Ok(page) => {
                            for event in page {
                                next = event.event_number.next();
                                yield Ok(event);
                            }
                        }
                        Err(error) => {
                            // Surface the error but keep polling; transient
                            // outages heal without tearing the stream down.
                            yield Err(error);
                            tokio::time::sleep(store.poll_interval).await;
                        }
                    }
                };
                // Pin the generator's output type to `()`; the infinite loop
                // above otherwise infers `!` under edition 2024 fallback.
                #[allow(unreachable_code)]
                ()
            };
            Ok(Box::pin(events) as EventStream)
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(map_sqlx)
        })
    }
}
