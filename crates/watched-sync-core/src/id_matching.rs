// Identity matching across servers that do not share native keys

use std::collections::{BTreeSet, HashMap};
use watched_sync_models::identifiers::normalize;
use watched_sync_models::{IdentityToken, MediaIdentifiers};

/// Check if two identities denote the same content
///
/// True when the two share a file/folder basename, or when any of the external IDs is
/// present and equal on both sides. Comparison is case-insensitive and blank values
/// never match. Used for movies and shows alike; episodes are only compared within a
/// show that has already matched.
pub fn same_identity(a: &MediaIdentifiers, b: &MediaIdentifiers) -> bool {
    // Location first, IDs cover files that were renamed on one server
    for location_a in a.locations.iter().filter_map(|l| normalize(l)) {
        if b.locations
            .iter()
            .filter_map(|l| normalize(l))
            .any(|location_b| location_b == location_a)
        {
            return true;
        }
    }

    ids_match(&a.imdb_id, &b.imdb_id)
        || ids_match(&a.tvdb_id, &b.tvdb_id)
        || ids_match(&a.tmdb_id, &b.tmdb_id)
}

fn ids_match(a: &Option<String>, b: &Option<String>) -> bool {
    match (a.as_deref().and_then(normalize), b.as_deref().and_then(normalize)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Token index over a list of identities
///
/// Maps each identity token to the positions that carry it, so finding the
/// counterparts of an item costs one lookup per token instead of a full scan.
/// Candidates are always confirmed with `same_identity`.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_token: HashMap<IdentityToken, Vec<usize>>,
}

impl IdentityIndex {
    pub fn build<'a, I>(identities: I) -> Self
    where
        I: IntoIterator<Item = &'a MediaIdentifiers>,
    {
        let mut by_token: HashMap<IdentityToken, Vec<usize>> = HashMap::new();
        for (position, ids) in identities.into_iter().enumerate() {
            for token in ids.tokens() {
                by_token.entry(token).or_default().push(position);
            }
        }
        Self { by_token }
    }

    /// Positions sharing at least one token with `ids`, in ascending order
    pub fn candidates(&self, ids: &MediaIdentifiers) -> BTreeSet<usize> {
        ids.tokens()
            .iter()
            .filter_map(|token| self.by_token.get(token))
            .flatten()
            .copied()
            .collect()
    }

    /// All positions in `items` whose identity matches `ids`
    pub fn matches<T, F>(&self, ids: &MediaIdentifiers, items: &[T], get_ids: F) -> Vec<usize>
    where
        F: Fn(&T) -> &MediaIdentifiers,
    {
        self.candidates(ids)
            .into_iter()
            .filter(|&position| {
                items
                    .get(position)
                    .map(|item| same_identity(ids, get_ids(item)))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}
