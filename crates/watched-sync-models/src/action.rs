use crate::media::SourceRef;
use crate::status::WatchedStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActionKind {
    MarkWatched,
    MarkUnwatched,
    SetPlaybackPosition { seconds: u64 },
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::MarkWatched => write!(f, "mark_watched"),
            ActionKind::MarkUnwatched => write!(f, "mark_unwatched"),
            ActionKind::SetPlaybackPosition { seconds } => {
                write!(f, "set_playback_position({}s)", seconds)
            }
        }
    }
}

/// A write the orchestrator should issue against `target`
///
/// `authoritative` is the status that won reconciliation; once the write succeeds the
/// target is expected to read the same, and the cache is updated accordingly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncAction {
    #[serde(flatten)]
    pub kind: ActionKind,
    pub target: SourceRef,
    pub user_key: String,
    pub title: String,
    pub authoritative: WatchedStatus,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' on {} for {} (item {})",
            self.kind, self.title, self.target.server, self.user_key, self.target.item_id
        )
    }
}
