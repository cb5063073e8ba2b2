pub mod api;

use crate::error::SourceError;
use crate::pool::run_bounded;
use crate::traits::MediaServer;
use api::{ItemDto, JellyfinHttpClient, UserDto, TICKS_PER_MS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use watched_sync_config::{ServerConfig, ServerKind};
use watched_sync_models::{
    LibraryData, MediaIdentifiers, MediaItem, Series, SourceRef, UserData, WatchedSnapshot,
    WatchedStatus,
};

/// Anything below one minute of playback is not worth syncing as "in progress"
pub const PARTIAL_WATCH_THRESHOLD_MS: u64 = 60_000;

/// Jellyfin or Emby server; both speak the same user/items API
pub struct JellyfinServer {
    name: String,
    kind: ServerKind,
    api: JellyfinHttpClient,
    max_workers: usize,
    accept_updates: bool,
    share_updates: bool,
}

impl JellyfinServer {
    pub fn new(config: &ServerConfig, max_workers: usize) -> Result<Self, SourceError> {
        let api = JellyfinHttpClient::new(&config.name, &config.url, &config.token)?;
        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            api,
            max_workers,
            accept_updates: config.accept_updates,
            share_updates: config.share_updates,
        })
    }

    async fn fetch_user(&self, user: &UserDto, now: DateTime<Utc>) -> Result<UserData, SourceError> {
        let mut user_data = UserData::default();

        for library in self.api.get_libraries(&user.id).await? {
            let title = match library.name.clone() {
                Some(title) => title,
                None => continue,
            };
            let mut data = LibraryData::new(title.clone());

            match library.collection_type.as_deref() {
                Some("movies") => {
                    let movies = self.api.get_library_items(&user.id, &library.id, "Movie").await?;
                    data.movies = movies
                        .iter()
                        .filter_map(|movie| self.to_media_item(movie, &user.id, now))
                        .collect();
                }
                Some("tvshows") => {
                    data.series = self.fetch_series(&user.id, &library.id, now).await?;
                }
                other => {
                    debug!("{}: skipping library '{}' of type {:?}", self.name, title, other);
                    continue;
                }
            }

            if !data.is_empty() {
                user_data.libraries.insert(title, data);
            }
        }

        Ok(user_data)
    }

    /// Episodes are fetched per show through the bounded pool
    async fn fetch_series(
        &self,
        user_id: &str,
        library_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Series>, SourceError> {
        let shows = self.api.get_library_items(user_id, library_id, "Series").await?;
        debug!("{}: fetching episodes for {} shows", self.name, shows.len());

        let results = run_bounded(shows, self.max_workers, |show| {
            let api = self.api.clone();
            let user_id = user_id.to_string();
            async move {
                let episodes = api.get_episodes(&user_id, &show.id).await;
                (show, episodes)
            }
        })
        .await;

        let mut series = Vec::new();
        for (show, episodes) in results {
            let episodes = match episodes {
                Ok(episodes) => episodes,
                Err(e) => {
                    warn!("{}: failed to fetch episodes for {:?}: {}", self.name, show.name, e);
                    continue;
                }
            };

            let episodes: Vec<MediaItem> = episodes
                .iter()
                .filter_map(|episode| self.to_media_item(episode, user_id, now))
                .collect();
            if !episodes.is_empty() {
                series.push(Series {
                    identifiers: identifiers_for(&show),
                    episodes,
                });
            }
        }
        Ok(series)
    }

    /// Played or meaningfully started movies and episodes only
    fn to_media_item(&self, item: &ItemDto, user_id: &str, now: DateTime<Utc>) -> Option<MediaItem> {
        if let Some(kind) = item.item_type.as_deref() {
            if !matches!(kind, "Movie" | "Episode") {
                debug!("{}: ignoring {} item {}", self.name, kind, item.id);
                return None;
            }
        }
        let user_data = item.user_data.as_ref()?;
        let time = user_data.playback_position_ticks / TICKS_PER_MS;
        if !user_data.played && time < PARTIAL_WATCH_THRESHOLD_MS {
            return None;
        }

        let last_viewed_at = user_data
            .last_played_date
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(MediaItem {
            identifiers: identifiers_for(item),
            status: WatchedStatus::observed(user_data.played, time, last_viewed_at, now),
            source: SourceRef::new(&self.name, user_id, &item.id),
        })
    }
}

fn identifiers_for(item: &ItemDto) -> MediaIdentifiers {
    let mut ids = MediaIdentifiers::new();
    if let Some(name) = &item.name {
        ids = ids.with_title(name.clone());
    }
    if let Some(path) = &item.path {
        ids = ids.with_location(path);
    }
    for source in &item.media_sources {
        if let Some(path) = &source.path {
            ids = ids.with_location(path);
        }
    }
    ids.imdb_id = item.provider_id("imdb");
    ids.tvdb_id = item.provider_id("tvdb");
    ids.tmdb_id = item.provider_id("tmdb");
    ids
}

#[async_trait]
impl MediaServer for JellyfinServer {
    fn instance_id(&self) -> &str {
        &self.name
    }

    fn accepts_updates(&self) -> bool {
        self.accept_updates
    }

    fn shares_updates(&self) -> bool {
        self.share_updates
    }

    async fn ping(&self) -> Result<(), SourceError> {
        self.api.ping().await
    }

    async fn fetch_watched(&self) -> Result<WatchedSnapshot, SourceError> {
        let now = Utc::now();
        let mut snapshot = WatchedSnapshot::new(&self.name);

        for user in self.api.get_users().await? {
            match self.fetch_user(&user, now).await {
                Ok(user_data) if !user_data.is_empty() => {
                    snapshot.users.insert(user.name.clone(), user_data);
                }
                Ok(_) => debug!("{}: no watched items for {}", self.name, user.name),
                Err(e) => warn!("{}: failed to fetch watched state for {}: {}", self.name, user.name, e),
            }
        }

        info!(
            "{} ({:?}): collected {} watched items across {} users",
            self.name,
            self.kind,
            snapshot.item_count(),
            snapshot.users.len()
        );
        Ok(snapshot)
    }

    async fn mark_watched(&self, target: &SourceRef) -> Result<(), SourceError> {
        self.api.mark_played(&target.user_id, &target.item_id).await
    }

    async fn mark_unwatched(&self, target: &SourceRef) -> Result<(), SourceError> {
        self.api.mark_unplayed(&target.user_id, &target.item_id).await
    }

    async fn set_playback_position(&self, target: &SourceRef, seconds: u64) -> Result<(), SourceError> {
        self.api
            .set_position(&target.user_id, &target.item_id, seconds * 1000)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> JellyfinServer {
        let config = ServerConfig {
            name: "den".to_string(),
            kind: ServerKind::Jellyfin,
            url: "http://den.local:8096/".to_string(),
            token: "token".to_string(),
            enabled: true,
            accept_updates: true,
            share_updates: false,
        };
        JellyfinServer::new(&config, 2).unwrap()
    }

    fn item(raw: &str) -> ItemDto {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_played_item_becomes_completed() {
        let server = server();
        let now = Utc::now();
        let movie = item(
            r#"{"Id": "m1", "Name": "Heat", "Path": "/movies/Heat.mkv",
                "ProviderIds": {"Imdb": "tt0113277"},
                "UserData": {"Played": true, "PlaybackPositionTicks": 0, "LastPlayedDate": "2024-03-01T20:15:00Z"}}"#,
        );

        let media = server.to_media_item(&movie, "u1", now).unwrap();
        assert!(media.status.completed);
        assert_eq!(media.identifiers.locations, vec!["Heat.mkv"]);
        assert_eq!(media.identifiers.imdb_id.as_deref(), Some("tt0113277"));
        assert_eq!(media.source, SourceRef::new("den", "u1", "m1"));
        assert_eq!(media.status.viewed_date.to_rfc3339(), "2024-03-01T20:15:00+00:00");
        assert_eq!(media.status.reported_viewed_at, Some(media.status.viewed_date));
        assert!(!server.shares_updates());
    }

    #[test]
    fn test_short_partial_watch_is_ignored() {
        let server = server();
        let now = Utc::now();
        let short = item(r#"{"Id": "e1", "UserData": {"Played": false, "PlaybackPositionTicks": 300000000}}"#);
        let long = item(r#"{"Id": "e2", "UserData": {"Played": false, "PlaybackPositionTicks": 9000000000}}"#);
        let unknown = item(r#"{"Id": "e3"}"#);

        assert!(server.to_media_item(&short, "u1", now).is_none());
        assert!(server.to_media_item(&unknown, "u1", now).is_none());

        let media = server.to_media_item(&long, "u1", now).unwrap();
        assert!(!media.status.completed);
        assert_eq!(media.status.time, 900_000);
        assert_eq!(media.status.viewed_date, now);
        assert!(media.status.reported_viewed_at.is_none());
    }

    #[test]
    fn test_only_movies_and_episodes_are_kept() {
        let server = server();
        let now = Utc::now();
        let trailer = item(r#"{"Id": "t1", "Type": "Trailer", "UserData": {"Played": true}}"#);
        let episode = item(r#"{"Id": "e4", "Type": "Episode", "UserData": {"Played": true}}"#);

        assert!(server.to_media_item(&trailer, "u1", now).is_none());
        assert!(server.to_media_item(&episode, "u1", now).unwrap().status.completed);
    }
}
