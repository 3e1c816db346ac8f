//! # Eventline Postgres
//!
//! `PostgreSQL`-backed durable stream store.
//!
//! [`PgStreamStore`] implements [`eventline_core::backend::StreamStore`] over
//! a single `stream_events` table using sqlx: transactional appends with
//! per-stream dense numbering, directional page reads and polling live
//! subscriptions. Hand it to the `eventline-store` facade as the durable
//! backend; the facade owns connectivity state and fallback behavior.

pub mod schema;
pub mod store;

pub use store::PgStreamStore;
