//! # Eventline Handlers
//!
//! The command/query layer over the event store facade.
//!
//! Writes go through [`command::CommandHandler`]: a typed [`command::Command`]
//! becomes exactly one event appended to a family stream. Reads go through
//! [`query::QueryHandler`], which resolves typed [`query::Query`] variants
//! against injected materialized [`views::Views`] — never against event
//! streams. The string-keyed dispatch the surrounding services speak survives
//! only at the edges, as `Command::parse` / `Query::parse`.

pub mod command;
pub mod query;
pub mod views;

pub use command::{Command, CommandAck, CommandError, CommandHandler};
pub use query::{Query, QueryError, QueryHandler};
pub use views::{ViewError, Views};
