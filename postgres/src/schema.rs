//! Database schema for the stream store.

use sqlx::PgPool;

/// The `stream_events` table: one row per event, addressed by
/// `(stream_name, event_number)`. Numbers are dense and start at 0 within
/// each stream; the primary key makes duplicate positions impossible.
pub const CREATE_STREAM_EVENTS: &str = r"
    CREATE TABLE IF NOT EXISTS stream_events (
        stream_name TEXT NOT NULL,
        event_number BIGINT NOT NULL,
        event_id UUID NOT NULL UNIQUE,
        event_type TEXT NOT NULL,
        data JSONB NOT NULL,
        metadata JSONB NOT NULL,
        created TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (stream_name, event_number)
    )
";

/// Index for event-type scans (projectors filtering by type).
pub const CREATE_TYPE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_stream_events_type ON stream_events(event_type)";

/// Index for time-ordered scans across streams.
pub const CREATE_CREATED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_stream_events_created ON stream_events(created)";

/// Create the schema if it does not exist. Idempotent.
///
/// # Errors
///
/// Returns the underlying [`sqlx::Error`] if any statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_STREAM_EVENTS).execute(pool).await?;
    sqlx::query(CREATE_TYPE_INDEX).execute(pool).await?;
    sqlx::query(CREATE_CREATED_INDEX).execute(pool).await?;
    tracing::info!("Stream store schema ready");
    Ok(())
}
