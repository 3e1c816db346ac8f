//! # Eventline Store
//!
//! The dual-mode event store facade: a durable stream store behind a
//! never-fail write path.
//!
//! This crate wraps any [`eventline_core::backend::StreamStore`] in the
//! [`EventStore`] facade, which:
//!
//! - appends and reads against the durable store while it is reachable;
//! - transparently degrades writes to a bounded in-memory
//!   [`fallback::FallbackBuffer`] when it is not — `append_event` never
//!   fails from the caller's perspective;
//! - runs a small {Disabled, Connected, Degraded} mode machine instead of
//!   scattering connectivity flags through every method;
//! - tracks process-local [`stats::StatsSnapshot`] counters and answers
//!   [`EventStore::health_check`] with one of
//!   `disabled`/`healthy`/`fallback`/`unhealthy`;
//! - offers snapshot compaction on derived `<stream>-snapshots` streams.
//!
//! Read the warning in [`facade`]'s module docs before relying on the
//! fallback path: degraded durability is invisible at the API surface by
//! design, and that is the single highest-risk tradeoff in this system.

pub mod config;
pub mod facade;
pub mod fallback;
pub mod snapshot;
pub mod stats;

pub use config::{StoreConfig, StoreConfigBuilder};
pub use facade::{AppendReceipt, EventStore, Health, Mode, Subscription, WriteSource};
pub use fallback::FallbackBuffer;
pub use snapshot::{SNAPSHOT_EVENT_TYPE, Snapshot};
pub use stats::{ConfigSnapshot, StatsSnapshot};
