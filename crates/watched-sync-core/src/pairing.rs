// Walk two snapshots in lockstep and yield identity-matched movies and episodes

use crate::id_matching::IdentityIndex;
use crate::mapping::NameMapping;
use tracing::{debug, info};
use watched_sync_models::{LibraryData, MediaItem, WatchedSnapshot};

/// Position of an item inside its `LibraryData`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Movie(usize),
    Episode { series: usize, episode: usize },
}

/// One item on each side that denote the same content
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair<'a> {
    pub user_1: &'a str,
    pub user_2: &'a str,
    pub library_1: &'a str,
    pub library_2: &'a str,
    pub slot_1: Slot,
    pub slot_2: Slot,
    pub item_1: &'a MediaItem,
    pub item_2: &'a MediaItem,
}

/// Every matched `(item_1, item_2)` across matched users and libraries
///
/// Users and libraries are resolved through `mapping`; anything still absent on the
/// other side is skipped. An item with several counterparts appears once per
/// counterpart. Episodes are only compared within shows that matched.
pub fn matched_pairs<'a>(
    list_1: &'a WatchedSnapshot,
    list_2: &'a WatchedSnapshot,
    mapping: &NameMapping,
) -> Vec<MatchedPair<'a>> {
    let mut pairs = Vec::new();

    for (user_1, data_1) in &list_1.users {
        let (user_2, data_2) = match mapping.resolve_user(user_1, &list_2.users) {
            Some(found) => found,
            None => {
                info!(
                    "User '{}' from {} not found on {}, skipping",
                    user_1, list_1.server, list_2.server
                );
                continue;
            }
        };

        for (library_1, lib_1) in &data_1.libraries {
            let (library_2, lib_2) = match mapping.resolve_library(library_1, &data_2.libraries) {
                Some(found) => found,
                None => {
                    debug!(
                        "Library '{}' for user '{}' not found on {}, skipping",
                        library_1, user_1, list_2.server
                    );
                    continue;
                }
            };

            let before = pairs.len();
            pair_library(lib_1, lib_2, |slot_1, item_1, slot_2, item_2| {
                pairs.push(MatchedPair {
                    user_1,
                    user_2,
                    library_1,
                    library_2,
                    slot_1,
                    slot_2,
                    item_1,
                    item_2,
                });
            });
            debug!(
                "matched_pairs: {}/{} <-> {}/{}: {} matches",
                user_1,
                library_1,
                user_2,
                library_2,
                pairs.len() - before
            );
        }
    }

    pairs
}

fn pair_library<'a, F>(lib_1: &'a LibraryData, lib_2: &'a LibraryData, mut emit: F)
where
    F: FnMut(Slot, &'a MediaItem, Slot, &'a MediaItem),
{
    let movie_index = IdentityIndex::build(lib_2.movies.iter().map(|m| &m.identifiers));
    for (i, movie) in lib_1.movies.iter().enumerate() {
        for j in movie_index.matches(&movie.identifiers, &lib_2.movies, |m| &m.identifiers) {
            emit(Slot::Movie(i), movie, Slot::Movie(j), &lib_2.movies[j]);
        }
    }

    let show_index = IdentityIndex::build(lib_2.series.iter().map(|s| &s.identifiers));
    for (si, show_1) in lib_1.series.iter().enumerate() {
        for sj in show_index.matches(&show_1.identifiers, &lib_2.series, |s| &s.identifiers) {
            let show_2 = &lib_2.series[sj];
            let episode_index = IdentityIndex::build(show_2.episodes.iter().map(|e| &e.identifiers));

            for (ei, episode) in show_1.episodes.iter().enumerate() {
                for ej in episode_index.matches(&episode.identifiers, &show_2.episodes, |e| &e.identifiers) {
                    emit(
                        Slot::Episode { series: si, episode: ei },
                        episode,
                        Slot::Episode { series: sj, episode: ej },
                        &show_2.episodes[ej],
                    );
                }
            }
        }
    }
}
