//! Stream identification, revision numbers and read options.
//!
//! A stream is a named, strictly ordered, append-only sequence of events.
//! This module defines the strong types used to address streams
//! ([`StreamName`]), positions within them ([`EventNumber`]) and the paging
//! parameters for reads ([`ReadOptions`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for [`StreamName`] parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream name: {0}")]
pub struct ParseStreamNameError(String);

/// Name of an event stream (an aggregate id or a category).
///
/// Examples: `"community"`, `"users"`, `"order-12345"`.
///
/// # Validation
///
/// - `FromStr::from_str()`: validates input (rejects empty strings)
/// - `new()` and `From`: no validation, for application-controlled names
///
/// Use `FromStr` when parsing external input; use `new()` when the name comes
/// from code you control.
///
/// # Examples
///
/// ```
/// use eventline_core::stream::StreamName;
///
/// let stream = StreamName::new("community");
/// assert_eq!(stream.as_str(), "community");
/// assert_eq!(stream.snapshot_stream().as_str(), "community-snapshots");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamName(String);

impl StreamName {
    /// Create a new `StreamName` from a string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the stream name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `StreamName` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The derived stream holding snapshots for this aggregate family.
    ///
    /// Snapshots for stream `"orders"` live on `"orders-snapshots"`.
    #[must_use]
    pub fn snapshot_stream(&self) -> Self {
        Self(format!("{}-snapshots", self.0))
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamName {
    type Err = ParseStreamNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamNameError(
                "stream name cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position of an event within a stream.
///
/// Numbers start at 0 and increase by 1 for each appended event. Once an
/// event is appended its number never changes.
///
/// # Examples
///
/// ```
/// use eventline_core::stream::EventNumber;
///
/// let n0 = EventNumber::new(0);
/// assert_eq!(n0.next(), EventNumber::new(1));
/// assert_eq!(n0.value(), 0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventNumber(u64);

impl EventNumber {
    /// The first position in a stream.
    pub const START: Self = Self(0);

    /// Create a new `EventNumber` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw position.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The next position (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EventNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<EventNumber> for u64 {
    fn from(number: EventNumber) -> Self {
        number.0
    }
}

/// Direction of a stream read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadDirection {
    /// Oldest first, starting at `from` and moving towards the head.
    #[default]
    Forward,
    /// Newest first, starting at the head (or `from`) and moving backwards.
    Backward,
}

/// Paging parameters for a stream read.
///
/// All fields are optional; the backend applies its own defaults for an
/// unset `max_count` (typically the configured batch size).
///
/// # Examples
///
/// ```
/// use eventline_core::stream::{EventNumber, ReadDirection, ReadOptions};
///
/// let opts = ReadOptions::default()
///     .from(EventNumber::new(10))
///     .max_count(25)
///     .direction(ReadDirection::Backward);
///
/// assert_eq!(opts.from, Some(EventNumber::new(10)));
/// assert_eq!(opts.max_count, Some(25));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// First revision to read (inclusive). `None` means the start of the
    /// stream for forward reads and the head for backward reads.
    pub from: Option<EventNumber>,
    /// Maximum number of events to return.
    pub max_count: Option<usize>,
    /// Read direction.
    pub direction: ReadDirection,
}

impl ReadOptions {
    /// Set the starting revision.
    #[must_use]
    pub const fn from(mut self, from: EventNumber) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the maximum number of events to return.
    #[must_use]
    pub const fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    /// Set the read direction.
    #[must_use]
    pub const fn direction(mut self, direction: ReadDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Convenience: read the single most recent event of a stream.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            from: None,
            max_count: Some(1),
            direction: ReadDirection::Backward,
        }
    }
}
