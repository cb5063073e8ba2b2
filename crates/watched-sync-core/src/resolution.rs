// Last-write-wins reconciliation producing explicit sync actions

use crate::error::EngineError;
use crate::mapping::NameMapping;
use crate::pairing::matched_pairs;
use crate::precedence::{precedence, Precedence};
use std::cmp::Ordering;
use tracing::debug;
use watched_sync_models::{ActionKind, MediaItem, SyncAction, WatchedSnapshot};

/// Actions that bring both snapshots in line, in either direction
///
/// For every identity-matched pair the side with the later `viewed_date` is
/// authoritative and the other side receives whatever writes make it read the same.
/// Equal timestamps, or statuses that already tie, produce nothing. Unmatched items
/// never produce an action.
pub fn sync_actions(
    list_1: &WatchedSnapshot,
    list_2: &WatchedSnapshot,
    mapping: &NameMapping,
) -> Result<Vec<SyncAction>, EngineError> {
    validate_snapshot(list_1)?;
    validate_snapshot(list_2)?;

    let pairs = matched_pairs(list_1, list_2, mapping);
    let mut actions = Vec::new();
    let mut ties = 0usize;
    let mut same_date = 0usize;

    for pair in &pairs {
        let status_1 = &pair.item_1.status;
        let status_2 = &pair.item_2.status;

        if precedence(status_1, status_2) == Precedence::Tie {
            ties += 1;
            continue;
        }

        match status_1.viewed_date.cmp(&status_2.viewed_date) {
            Ordering::Greater => actions.extend(actions_for(pair.item_1, pair.item_2, pair.user_2)),
            Ordering::Less => actions.extend(actions_for(pair.item_2, pair.item_1, pair.user_1)),
            Ordering::Equal => same_date += 1,
        }
    }

    debug!(
        "sync_actions: {} <-> {}: pairs={}, ties={}, same_date={}, actions={}",
        list_1.server,
        list_2.server,
        pairs.len(),
        ties,
        same_date,
        actions.len()
    );

    Ok(actions)
}

/// Writes that make `target` read the same as `authoritative`
///
/// `target_user` is the account key on the target's server.
pub(crate) fn actions_for(authoritative: &MediaItem, target: &MediaItem, target_user: &str) -> Vec<SyncAction> {
    let wanted = &authoritative.status;
    let current = &target.status;

    let kinds = match (wanted.completed, current.completed) {
        (true, true) => vec![],
        (true, false) => vec![ActionKind::MarkWatched],
        (false, true) => {
            let mut kinds = vec![ActionKind::MarkUnwatched];
            if wanted.seconds() > 0 {
                kinds.push(ActionKind::SetPlaybackPosition {
                    seconds: wanted.seconds(),
                });
            }
            kinds
        }
        (false, false) if wanted.seconds() != current.seconds() => {
            vec![ActionKind::SetPlaybackPosition {
                seconds: wanted.seconds(),
            }]
        }
        (false, false) => vec![],
    };

    kinds
        .into_iter()
        .map(|kind| SyncAction {
            kind,
            target: target.source.clone(),
            user_key: target_user.to_string(),
            title: authoritative.identifiers.display_name(),
            authoritative: wanted.clone(),
        })
        .collect()
}

/// Every item must be addressable for write-back
pub(crate) fn validate_snapshot(snapshot: &WatchedSnapshot) -> Result<(), EngineError> {
    let mut error = None;

    snapshot.for_each_item(|_, item| {
        if error.is_some() {
            return;
        }
        let reason = if item.source.server.trim().is_empty() {
            Some("missing source server")
        } else if item.source.user_id.trim().is_empty() {
            Some("missing source user id")
        } else if item.source.item_id.trim().is_empty() {
            Some("missing native item id")
        } else {
            None
        };

        if let Some(reason) = reason {
            error = Some(EngineError::InvalidItem {
                server: snapshot.server.clone(),
                item: item.identifiers.display_name(),
                reason: reason.to_string(),
            });
        }
    });

    match error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
