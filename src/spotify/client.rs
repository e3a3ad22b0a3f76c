use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use color_eyre::eyre::Result;

use crate::model::{Artist, PlayedItem, Track};
use crate::ports::spotify::SpotifyClient;
use crate::spotify::types::{
    ArtistsResponse, CurrentlyPlayingObject, ErrorEnvelope, RecentlyPlayedPage, TokenResponse,
    TracksResponse,
};

const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_API_BASE: &str = "https://api.spotify.com";

/// Page size of the recently-played endpoint and id limit of the batch
/// lookup endpoints.
const BATCH_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum SpotifyError {
    #[error("User has no refresh token")]
    MissingRefreshToken,
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
    #[error("Unexpected response code {code} from {context}")]
    UnexpectedResponseCode { context: &'static str, code: u16 },
    #[error("Spotify API error ({code}): {message}")]
    Api { message: String, code: u16 },
}

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
}

impl SpotifyApiCredentials {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    fn basic_auth_header(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        )
    }
}

/// Spotify API client. Pure request/response; retry policy, if any, is the
/// caller's responsibility.
#[derive(Clone)]
pub struct SpotifyApi {
    credentials: SpotifyApiCredentials,
    http: reqwest::Client,
    token_url: String,
    api_base: String,
}

impl SpotifyApi {
    pub fn new(credentials: SpotifyApiCredentials) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            api_base: SPOTIFY_API_BASE.to_string(),
        }
    }

    /// Exchange a refresh token for a fresh access token.
    /// https://developer.spotify.com/documentation/web-api/tutorials/refreshing-tokens
    pub async fn token_refresh(&self, refresh_token: &str) -> Result<TokenResponse, SpotifyError> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", self.credentials.client_id.as_str());

        let response = self
            .http
            .post(&self.token_url)
            // Serializes to x-www-form-urlencoded and sets the header, as
            // required by spotify
            .form(&params)
            .header("Authorization", self.credentials.basic_auth_header())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(SpotifyError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(api_error("token refresh", response).await);
        }

        response
            .json()
            .await
            .map_err(SpotifyError::FailedToParseResponse)
    }

    /// Fetch the plays newer than `after_millis`, following `next` links
    /// until the window is exhausted.
    pub async fn get_recently_played(
        &self,
        access_token: &str,
        after_millis: i64,
    ) -> Result<Vec<PlayedItem>, SpotifyError> {
        let mut items = Vec::new();
        let mut next_url = Some(format!(
            "{}/v1/me/player/recently-played?limit={}&after={}",
            self.api_base, BATCH_LIMIT, after_millis
        ));

        while let Some(url) = next_url {
            let response = self
                .bearer_get(&url, access_token)
                .await
                .map_err(SpotifyError::FailedToSendRequest)?;

            if !response.status().is_success() {
                return Err(api_error("recently played", response).await);
            }

            let page: RecentlyPlayedPage = response
                .json()
                .await
                .map_err(SpotifyError::FailedToParseResponse)?;
            items.extend(page.items.into_iter().map(PlayedItem::from));
            next_url = page.next;
        }

        Ok(items)
    }

    /// Batch track lookup by id. An empty id list short-circuits without a
    /// network call; ids beyond the provider limit are chunked.
    pub async fn get_tracks(
        &self,
        access_token: &str,
        ids: &[String],
    ) -> Result<Vec<Track>, SpotifyError> {
        let mut tracks = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(BATCH_LIMIT) {
            let url = format!("{}/v1/tracks?ids={}", self.api_base, chunk.join(","));
            let response = self
                .bearer_get(&url, access_token)
                .await
                .map_err(SpotifyError::FailedToSendRequest)?;

            if !response.status().is_success() {
                return Err(api_error("tracks lookup", response).await);
            }

            let page: TracksResponse = response
                .json()
                .await
                .map_err(SpotifyError::FailedToParseResponse)?;
            // Unknown ids come back as null entries
            tracks.extend(page.tracks.into_iter().flatten().map(Track::from));
        }

        Ok(tracks)
    }

    /// Batch artist lookup by id, same shape as [`Self::get_tracks`].
    pub async fn get_artists(
        &self,
        access_token: &str,
        ids: &[String],
    ) -> Result<Vec<Artist>, SpotifyError> {
        let mut artists = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(BATCH_LIMIT) {
            let url = format!("{}/v1/artists?ids={}", self.api_base, chunk.join(","));
            let response = self
                .bearer_get(&url, access_token)
                .await
                .map_err(SpotifyError::FailedToSendRequest)?;

            if !response.status().is_success() {
                return Err(api_error("artists lookup", response).await);
            }

            let page: ArtistsResponse = response
                .json()
                .await
                .map_err(SpotifyError::FailedToParseResponse)?;
            artists.extend(page.artists.into_iter().map(Artist::from));
        }

        Ok(artists)
    }

    /// Fetch the user's currently-playing track. A 204 means nothing is
    /// available.
    pub async fn get_currently_playing(
        &self,
        access_token: &str,
    ) -> Result<Option<CurrentlyPlayingObject>, SpotifyError> {
        let url = format!("{}/v1/me/player/currently-playing", self.api_base);
        let response = self
            .bearer_get(&url, access_token)
            .await
            .map_err(SpotifyError::FailedToSendRequest)?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error("currently playing", response).await);
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(SpotifyError::FailedToParseResponse)
    }

    async fn bearer_get(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(url)
            .bearer_auth(access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
    }
}

/// Map a non-success response into the structured provider error when the
/// body carries one, falling back to the bare status code.
async fn api_error(context: &'static str, response: reqwest::Response) -> SpotifyError {
    let code = response.status().as_u16();
    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => match envelope.into_message() {
            Some(message) => SpotifyError::Api { message, code },
            None => SpotifyError::UnexpectedResponseCode { context, code },
        },
        Err(_) => SpotifyError::UnexpectedResponseCode { context, code },
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyApi {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let token = self.token_refresh(refresh_token).await?;
        Ok(token.access_token)
    }

    async fn recently_played(
        &self,
        access_token: &str,
        after_millis: i64,
    ) -> Result<Vec<PlayedItem>> {
        Ok(self.get_recently_played(access_token, after_millis).await?)
    }

    async fn tracks_by_ids(&self, access_token: &str, ids: &[String]) -> Result<Vec<Track>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.get_tracks(access_token, ids).await?)
    }

    async fn artists_by_ids(&self, access_token: &str, ids: &[String]) -> Result<Vec<Artist>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.get_artists(access_token, ids).await?)
    }
}
