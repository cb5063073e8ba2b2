// Push-list computation: what one server still needs to send to another

use crate::mapping::NameMapping;
use crate::pairing::{matched_pairs, Slot};
use crate::precedence::{precedence, Precedence};
use crate::resolution::actions_for;
use std::collections::HashSet;
use tracing::debug;
use watched_sync_models::{LibraryData, Series, SyncAction, UserData, WatchedSnapshot};

/// Items of `list_1` that `list_2` does not already reflect
///
/// An item is removed when any of its counterparts in `list_2` is ahead of it or level
/// with it. Unmatched items are kept. Emptied shows, libraries and users are pruned
/// afterwards. The input is not modified, and applying the filter again with the same
/// `list_2` changes nothing.
pub fn cleanup(list_1: &WatchedSnapshot, list_2: &WatchedSnapshot, mapping: &NameMapping) -> WatchedSnapshot {
    let pairs = matched_pairs(list_1, list_2, mapping);

    let mut covered: HashSet<(&str, &str, Slot)> = HashSet::new();
    for pair in &pairs {
        if precedence(&pair.item_1.status, &pair.item_2.status) != Precedence::FirstAhead {
            covered.insert((pair.user_1, pair.library_1, pair.slot_1));
        }
    }

    let mut filtered = WatchedSnapshot::new(list_1.server.clone());
    for (user_key, user) in &list_1.users {
        let mut kept_user = UserData::default();
        for (library_key, library) in &user.libraries {
            let is_covered = |slot: Slot| covered.contains(&(user_key.as_str(), library_key.as_str(), slot));
            let kept = filter_library(library, is_covered);
            if !kept.is_empty() {
                kept_user.libraries.insert(library_key.clone(), kept);
            }
        }
        if !kept_user.is_empty() {
            filtered.users.insert(user_key.clone(), kept_user);
        }
    }

    debug!(
        "cleanup: {} vs {}: source_items={}, matched_pairs={}, removed={}, remaining={}",
        list_1.server,
        list_2.server,
        list_1.item_count(),
        pairs.len(),
        covered.len(),
        filtered.item_count()
    );

    filtered
}

/// Deep copy of `library` without covered items, bottom-up
fn filter_library<F>(library: &LibraryData, is_covered: F) -> LibraryData
where
    F: Fn(Slot) -> bool,
{
    let mut kept = LibraryData::new(library.title.clone());

    kept.movies = library
        .movies
        .iter()
        .enumerate()
        .filter(|(i, _)| !is_covered(Slot::Movie(*i)))
        .map(|(_, movie)| movie.clone())
        .collect();

    for (si, series) in library.series.iter().enumerate() {
        let episodes: Vec<_> = series
            .episodes
            .iter()
            .enumerate()
            .filter(|(ei, _)| !is_covered(Slot::Episode { series: si, episode: *ei }))
            .map(|(_, episode)| episode.clone())
            .collect();

        if !episodes.is_empty() {
            kept.series.push(Series {
                identifiers: series.identifiers.clone(),
                episodes,
            });
        }
    }

    kept
}

/// Turn a `cleanup` result into writes against `target`
///
/// Each remaining item is ahead of all its counterparts on `target`, so every
/// counterpart is brought up to it. Items with no counterpart produce nothing.
pub fn push_actions(filtered: &WatchedSnapshot, target: &WatchedSnapshot, mapping: &NameMapping) -> Vec<SyncAction> {
    let mut actions = Vec::new();

    for pair in matched_pairs(filtered, target, mapping) {
        if precedence(&pair.item_1.status, &pair.item_2.status) == Precedence::FirstAhead {
            actions.extend(actions_for(pair.item_1, pair.item_2, pair.user_2));
        }
    }

    debug!(
        "push_actions: {} -> {}: {} actions from {} candidate items",
        filtered.server,
        target.server,
        actions.len(),
        filtered.item_count()
    );

    actions
}

#[cfg(test)]
mod tests;
