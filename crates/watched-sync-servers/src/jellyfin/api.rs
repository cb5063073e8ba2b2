use crate::error::SourceError;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, trace};

/// 100-nanosecond ticks per millisecond
pub const TICKS_PER_MS: u64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDto {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUserData {
    #[serde(default)]
    pub played: bool,
    #[serde(default)]
    pub playback_position_ticks: u64,
    #[serde(default)]
    pub last_played_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceDto {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "Type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub collection_type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
    #[serde(default)]
    pub media_sources: Vec<MediaSourceDto>,
    #[serde(default)]
    pub user_data: Option<ItemUserData>,
}

impl ItemDto {
    /// Provider ids are keyed inconsistently ("Imdb", "IMDB", "imdb") across versions
    pub fn provider_id(&self, provider: &str) -> Option<String> {
        self.provider_ids
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(provider) && !value.trim().is_empty())
            .map(|(_, value)| value.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<ItemDto>,
}

/// Thin HTTP wrapper over the Jellyfin/Emby REST API
#[derive(Clone)]
pub struct JellyfinHttpClient {
    client: Client,
    base_url: String,
    server: String,
}

impl JellyfinHttpClient {
    pub fn new(server: &str, base_url: &str, token: &str) -> Result<Self, SourceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::HeaderName::from_static("x-emby-token"),
            reqwest::header::HeaderValue::from_str(token)
                .map_err(|e| SourceError::new(format!("Invalid token for {}: {}", server, e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| SourceError::Http {
                server: server.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server: server.to_string(),
        })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, endpoint))
    }

    async fn send(&self, builder: RequestBuilder, endpoint: &str) -> Result<reqwest::Response, SourceError> {
        let response = builder.send().await.map_err(|source| SourceError::Http {
            server: self.server.clone(),
            source,
        })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                server: self.server.clone(),
                status: response.status().as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        trace!("{}: GET {} {:?}", self.server, endpoint, query);
        let response = self
            .send(self.request(Method::GET, endpoint).query(query), endpoint)
            .await?;

        response.json::<T>().await.map_err(|e| SourceError::Decode {
            server: self.server.clone(),
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn ping(&self) -> Result<(), SourceError> {
        let endpoint = "/System/Info";
        self.send(self.request(Method::GET, endpoint), endpoint).await?;
        debug!("{}: server reachable", self.server);
        Ok(())
    }

    pub async fn get_users(&self) -> Result<Vec<UserDto>, SourceError> {
        self.get_json("/Users", &[]).await
    }

    pub async fn get_libraries(&self, user_id: &str) -> Result<Vec<ItemDto>, SourceError> {
        let endpoint = format!("/Users/{}/Views", user_id);
        let response: ItemsResponse = self.get_json(&endpoint, &[]).await?;
        Ok(response.items)
    }

    /// Movies or series directly inside a library, with user data
    pub async fn get_library_items(
        &self,
        user_id: &str,
        library_id: &str,
        item_type: &str,
    ) -> Result<Vec<ItemDto>, SourceError> {
        let endpoint = format!("/Users/{}/Items", user_id);
        let response: ItemsResponse = self
            .get_json(
                &endpoint,
                &[
                    ("ParentId", library_id),
                    ("IncludeItemTypes", item_type),
                    ("Recursive", "true"),
                    ("Fields", "ProviderIds,Path,MediaSources"),
                    ("EnableUserData", "true"),
                ],
            )
            .await?;
        Ok(response.items)
    }

    pub async fn get_episodes(&self, user_id: &str, series_id: &str) -> Result<Vec<ItemDto>, SourceError> {
        let endpoint = format!("/Shows/{}/Episodes", series_id);
        let response: ItemsResponse = self
            .get_json(
                &endpoint,
                &[
                    ("UserId", user_id),
                    ("Fields", "ProviderIds,Path,MediaSources"),
                    ("EnableUserData", "true"),
                ],
            )
            .await?;
        Ok(response.items)
    }

    pub async fn mark_played(&self, user_id: &str, item_id: &str) -> Result<(), SourceError> {
        let endpoint = format!("/Users/{}/PlayedItems/{}", user_id, item_id);
        self.send(self.request(Method::POST, &endpoint), &endpoint).await?;
        Ok(())
    }

    pub async fn mark_unplayed(&self, user_id: &str, item_id: &str) -> Result<(), SourceError> {
        let endpoint = format!("/Users/{}/PlayedItems/{}", user_id, item_id);
        self.send(self.request(Method::DELETE, &endpoint), &endpoint).await?;
        Ok(())
    }

    pub async fn set_position(&self, user_id: &str, item_id: &str, position_ms: u64) -> Result<(), SourceError> {
        let endpoint = format!("/Users/{}/Items/{}/UserData", user_id, item_id);
        let body = json!({
            "PlaybackPositionTicks": position_ms * TICKS_PER_MS,
            "Played": false,
        });
        self.send(self.request(Method::POST, &endpoint).json(&body), &endpoint)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_dto_parses_user_data() {
        let raw = r#"{
            "Id": "abc",
            "Name": "Heat",
            "Type": "Movie",
            "Path": "/movies/Heat (1995)/Heat.mkv",
            "ProviderIds": {"IMDB": "tt0113277", "Tmdb": "949", "Tvdb": ""},
            "UserData": {"Played": false, "PlaybackPositionTicks": 12000000000, "LastPlayedDate": "2024-03-01T20:15:00.0000000Z"}
        }"#;
        let item: ItemDto = serde_json::from_str(raw).unwrap();

        assert_eq!(item.provider_id("imdb").as_deref(), Some("tt0113277"));
        assert_eq!(item.provider_id("tmdb").as_deref(), Some("949"));
        assert_eq!(item.provider_id("tvdb"), None);
        let user_data = item.user_data.unwrap();
        assert_eq!(user_data.playback_position_ticks / TICKS_PER_MS, 1_200_000);
        assert!(item.media_sources.is_empty());
    }
}
