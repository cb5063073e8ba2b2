use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalized identity of a piece of content, independent of any server's native key
///
/// Adapters build one of these per movie, show and episode. `title` is carried for
/// display only and never takes part in matching. `locations` holds file or folder
/// basenames as reported by the server; external IDs are opaque strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaIdentifiers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<String>,
}

/// One comparable component of an identity, lowercased and trimmed
///
/// Two identities denote the same content when they share at least one token, so a
/// token works as a hash key into an index of candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityToken {
    Location(String),
    Imdb(String),
    Tvdb(String),
    Tmdb(String),
}

impl MediaIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Record a file or folder location; only its basename is kept
    pub fn with_location(mut self, path: &str) -> Self {
        if let Some(name) = basename(path) {
            if !self.locations.iter().any(|existing| existing == name) {
                self.locations.push(name.to_string());
            }
        }
        self
    }

    pub fn with_imdb(mut self, id: impl Into<String>) -> Self {
        self.imdb_id = Some(id.into());
        self
    }

    pub fn with_tvdb(mut self, id: impl Into<String>) -> Self {
        self.tvdb_id = Some(id.into());
        self
    }

    pub fn with_tmdb(mut self, id: impl Into<String>) -> Self {
        self.tmdb_id = Some(id.into());
        self
    }

    /// Whether there is anything here that could ever match another item
    pub fn is_matchable(&self) -> bool {
        !self.tokens().is_empty()
    }

    /// Canonical token set: order-independent and case-normalized, empty values dropped
    pub fn tokens(&self) -> BTreeSet<IdentityToken> {
        let mut tokens: BTreeSet<IdentityToken> = self
            .locations
            .iter()
            .filter_map(|location| normalize(location))
            .map(IdentityToken::Location)
            .collect();

        if let Some(id) = self.imdb_id.as_deref().and_then(normalize) {
            tokens.insert(IdentityToken::Imdb(id));
        }
        if let Some(id) = self.tvdb_id.as_deref().and_then(normalize) {
            tokens.insert(IdentityToken::Tvdb(id));
        }
        if let Some(id) = self.tmdb_id.as_deref().and_then(normalize) {
            tokens.insert(IdentityToken::Tmdb(id));
        }
        tokens
    }

    /// Best label for logs: the title, else the first location, else an external ID
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.locations.first().cloned())
            .or_else(|| self.imdb_id.clone())
            .or_else(|| self.tvdb_id.clone())
            .or_else(|| self.tmdb_id.clone())
            .unwrap_or_else(|| "<unidentified>".to_string())
    }
}

/// Lowercase and trim an identifier, treating blank values as absent
pub fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Last non-empty path component, accepting both `/` and `\` separators
fn basename(path: &str) -> Option<&str> {
    path.trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .find(|segment| !segment.is_empty())
}
