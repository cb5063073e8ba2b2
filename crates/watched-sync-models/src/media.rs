use crate::identifiers::MediaIdentifiers;
use crate::status::WatchedStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address of an item on its owning server, used only to issue write-backs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub server: String,
    pub user_id: String,
    pub item_id: String,
}

impl SourceRef {
    pub fn new(
        server: impl Into<String>,
        user_id: impl Into<String>,
        item_id: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            user_id: user_id.into(),
            item_id: item_id.into(),
        }
    }
}

/// A movie or episode together with its watched state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaItem {
    pub identifiers: MediaIdentifiers,
    pub status: WatchedStatus,
    pub source: SourceRef,
}

/// A show and its episodes; season numbering is not part of identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Series {
    pub identifiers: MediaIdentifiers,
    #[serde(default)]
    pub episodes: Vec<MediaItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryData {
    pub title: String,
    #[serde(default)]
    pub movies: Vec<MediaItem>,
    #[serde(default)]
    pub series: Vec<Series>,
}

impl LibraryData {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            movies: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.series.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.movies.len() + self.series.iter().map(|s| s.episodes.len()).sum::<usize>()
    }
}

/// Libraries of one account on one server, keyed by library title
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserData {
    #[serde(default)]
    pub libraries: BTreeMap<String, LibraryData>,
}

impl UserData {
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.libraries.values().map(LibraryData::item_count).sum()
    }
}

/// Everything one server reported for one poll cycle, keyed by account name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchedSnapshot {
    pub server: String,
    #[serde(default)]
    pub users: BTreeMap<String, UserData>,
}

impl WatchedSnapshot {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            users: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.users.values().map(UserData::item_count).sum()
    }

    /// Visit every movie and episode along with the account it belongs to
    pub fn for_each_item<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &MediaItem),
    {
        for (user_key, user) in &self.users {
            for library in user.libraries.values() {
                for movie in &library.movies {
                    visit(user_key, movie);
                }
                for series in &library.series {
                    for episode in &series.episodes {
                        visit(user_key, episode);
                    }
                }
            }
        }
    }

    pub fn for_each_item_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&str, &mut MediaItem),
    {
        for (user_key, user) in self.users.iter_mut() {
            for library in user.libraries.values_mut() {
                for movie in library.movies.iter_mut() {
                    visit(user_key, movie);
                }
                for series in library.series.iter_mut() {
                    for episode in series.episodes.iter_mut() {
                        visit(user_key, episode);
                    }
                }
            }
        }
    }
}
