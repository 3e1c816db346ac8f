//! # Eventline Testing
//!
//! In-memory doubles for testing Eventline components without external
//! infrastructure:
//!
//! - [`InMemoryStreamStore`]: a full [`eventline_core::backend::StreamStore`]
//!   backend with an availability toggle for simulating outages
//! - [`InMemoryViews`]: one store implementing every materialized-view trait
//!   the query handlers read from, with seed helpers and a failure toggle
//!
//! Everything here is deterministic and process-local; integration tests
//! against a real backend live in `eventline-postgres`.

pub mod stream_store;
pub mod view_mocks;

pub use stream_store::InMemoryStreamStore;
pub use view_mocks::InMemoryViews;
