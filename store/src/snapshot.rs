//! Aggregate snapshots.
//!
//! A snapshot compacts an aggregate's event history into a point-in-time
//! state. It is stored as the `data` payload of a special event of type
//! [`SNAPSHOT_EVENT_TYPE`] appended to the derived `<stream>-snapshots`
//! stream; later snapshots supersede earlier ones but nothing is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type tag used for snapshot events.
pub const SNAPSHOT_EVENT_TYPE: &str = "snapshot";

/// A materialized point-in-time state for one aggregate.
///
/// # Examples
///
/// ```
/// use eventline_store::snapshot::Snapshot;
///
/// let snapshot = Snapshot::new("agg-1", serde_json::json!({ "count": 3 }), 3);
/// assert_eq!(snapshot.aggregate_id, "agg-1");
/// assert_eq!(snapshot.version, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: String,
    /// The compacted aggregate state.
    pub snapshot: serde_json::Value,
    /// The aggregate version the state was taken at.
    pub version: u64,
    /// When the snapshot was created.
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a snapshot stamped with the current time.
    #[must_use]
    pub fn new(aggregate_id: impl Into<String>, state: serde_json::Value, version: u64) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            snapshot: state,
            version,
            created_at: Utc::now(),
        }
    }
}
