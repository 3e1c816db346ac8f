//! # Eventline Core
//!
//! Core types and traits for the Eventline event-sourcing substrate.
//!
//! This crate defines the vocabulary shared by every other Eventline crate:
//!
//! - **Events**: [`event::EventRecord`] (what gets appended) and
//!   [`event::RecordedEvent`] (the uniform shape of what gets read back),
//!   with [`event::EventMetadata`] carrying correlation/causation ids.
//! - **Streams**: [`stream::StreamName`] and [`stream::EventNumber`] newtypes,
//!   plus [`stream::ReadOptions`] for paged, directional reads.
//! - **Backends**: the [`backend::StreamStore`] trait — the seam between the
//!   dual-mode facade in `eventline-store` and whatever durable log actually
//!   holds the events (PostgreSQL in `eventline-postgres`, an in-memory store
//!   in `eventline-testing`).
//!
//! ## Architecture Principles
//!
//! - Events are immutable facts: created once, appended exactly once to
//!   exactly one stream, never mutated or deleted.
//! - Within a stream, order is append order and every event's
//!   [`stream::EventNumber`] is fixed at append time.
//! - Payloads are arbitrary JSON documents (`serde_json::Value`); Eventline
//!   does not impose a schema on event data.
//!
//! ## Example
//!
//! ```
//! use eventline_core::event::EventRecord;
//! use eventline_core::stream::{ReadOptions, StreamName};
//!
//! let stream = StreamName::new("community");
//! let event = EventRecord::new(
//!     "community:post_created",
//!     serde_json::json!({ "title": "Hello", "userId": "u1" }),
//! );
//!
//! assert_eq!(event.event_type, "community:post_created");
//! assert_eq!(stream.snapshot_stream().as_str(), "community-snapshots");
//!
//! let opts = ReadOptions::default().max_count(50);
//! assert_eq!(opts.max_count, Some(50));
//! ```

pub mod backend;
pub mod event;
pub mod stream;

pub use backend::{EventStream, StoreError, StreamStore};
pub use event::{EventMetadata, EventRecord, RecordedEvent};
pub use stream::{EventNumber, ReadDirection, ReadOptions, StreamName};
