use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Watched state of one item on one server
///
/// `time` is elapsed playback in milliseconds and is meaningless once `completed` is set.
/// `viewed_date` is the instant the status is believed to have last changed at the
/// source and is what reconciliation compares. `reported_viewed_at` is the server's
/// own "last viewed", if it gave one. `last_updated_at` is when this observation was
/// recorded locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchedStatus {
    pub completed: bool,
    #[serde(default)]
    pub time: u64,
    pub viewed_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_viewed_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl WatchedStatus {
    /// Build a status as an adapter observed it
    ///
    /// A missing "last viewed" falls back to `now` for `viewed_date`, but stays absent in
    /// `reported_viewed_at` so stamping can replace it with the cycle's instant.
    pub fn observed(
        completed: bool,
        time: u64,
        last_viewed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            completed,
            time,
            viewed_date: last_viewed_at.unwrap_or(now),
            reported_viewed_at: last_viewed_at,
            last_updated_at: now,
        }
    }

    /// Playback position in whole seconds
    pub fn seconds(&self) -> u64 {
        self.time / 1000
    }
}
