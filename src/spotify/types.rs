//! Wire-format types for the Spotify endpoints this job consumes.
//!
//! The recently-played and currently-playing endpoints model overlapping
//! but non-identical shapes for the same conceptual entities, so each gets
//! its own DTO here and maps into the canonical model explicitly.

use serde::Deserialize;

use crate::model::{Album, Artist, PlayedItem, Track};

/// Spotify OAuth token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageObject {
    pub url: String,
    pub height: Option<i32>,
    pub width: Option<i32>,
}

/// Artist as embedded in track and album objects: id and name only.
#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedArtistObject {
    pub id: String,
    pub name: String,
}

/// Artist from the `/v1/artists` batch endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FullArtistObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtistObject>,
    #[serde(default)]
    pub images: Vec<ImageObject>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub album: AlbumObject,
    pub artists: Vec<SimplifiedArtistObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryObject {
    pub track: TrackObject,
    pub played_at: String,
}

/// One page of `/v1/me/player/recently-played`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayedPage {
    pub items: Vec<PlayHistoryObject>,
    pub next: Option<String>,
}

/// `/v1/tracks` returns `null` entries for ids it does not know.
#[derive(Debug, Clone, Deserialize)]
pub struct TracksResponse {
    pub tracks: Vec<Option<TrackObject>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistsResponse {
    pub artists: Vec<FullArtistObject>,
}

/// `/v1/me/player/currently-playing` variant. The item is absent between
/// tracks even on a 200.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlayingObject {
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<i64>,
    pub item: Option<TrackObject>,
}

/// Spotify error bodies come in two shapes: `{status, message}` and
/// `{error: {status, message}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Flatten either shape into a message, if the body carried one.
    pub fn into_message(self) -> Option<String> {
        match self.error {
            Some(detail) => detail.message,
            None => self.message,
        }
    }
}

impl From<SimplifiedArtistObject> for Artist {
    fn from(artist: SimplifiedArtistObject) -> Self {
        Artist {
            id: artist.id,
            name: artist.name,
            genres: vec![],
            image_url: None,
        }
    }
}

impl From<FullArtistObject> for Artist {
    fn from(artist: FullArtistObject) -> Self {
        Artist {
            id: artist.id,
            name: artist.name,
            genres: artist.genres,
            image_url: artist.images.into_iter().next().map(|image| image.url),
        }
    }
}

impl From<AlbumObject> for Album {
    fn from(album: AlbumObject) -> Self {
        Album {
            id: album.id,
            name: album.name,
            artists: album.artists.into_iter().map(Artist::from).collect(),
            image_url: album.images.into_iter().next().map(|image| image.url),
            release_date: album.release_date,
        }
    }
}

impl From<TrackObject> for Track {
    fn from(track: TrackObject) -> Self {
        Track {
            id: track.id,
            name: track.name,
            duration_ms: track.duration_ms,
            album: Album::from(track.album),
            artists: track.artists.into_iter().map(Artist::from).collect(),
        }
    }
}

impl From<PlayHistoryObject> for PlayedItem {
    fn from(item: PlayHistoryObject) -> Self {
        PlayedItem {
            track: Track::from(item.track),
            played_at: item.played_at,
        }
    }
}
