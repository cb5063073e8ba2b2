use async_trait::async_trait;
use watched_sync_models::{SourceRef, WatchedSnapshot};
use crate::error::SourceError;

/// Boundary between the reconciliation core and one media server instance
///
/// Adapters own pagination, GUID extraction and partial-watch thresholds. What they
/// hand back from `fetch_watched` is a fully materialized snapshot for one poll cycle.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Stable instance id, used as the first level of cache keys and in actions
    fn instance_id(&self) -> &str;

    /// Whether other servers may write watched state into this one
    fn accepts_updates(&self) -> bool {
        true
    }

    /// Whether this server's watched state may be written into others
    fn shares_updates(&self) -> bool {
        true
    }

    /// Cheap reachability/credential check before a cycle
    async fn ping(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn fetch_watched(&self) -> Result<WatchedSnapshot, SourceError>;

    async fn mark_watched(&self, target: &SourceRef) -> Result<(), SourceError>;
    async fn mark_unwatched(&self, target: &SourceRef) -> Result<(), SourceError>;
    async fn set_playback_position(&self, target: &SourceRef, seconds: u64) -> Result<(), SourceError>;
}
