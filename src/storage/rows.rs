//! Row-level shapes of the bulk-write RPC payload. Strongly typed so shape
//! drift against the storage procedure is caught at compile time instead
//! of inside an untyped key-value bag.

use serde::Serialize;

use crate::model::{Album, Artist, PlayEvent, Track};

#[derive(Debug, Clone, Serialize)]
pub struct PlayRow {
    pub user_id: String,
    pub track_id: String,
    pub played_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackRow {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub album_id: String,
    pub artist_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistRow {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumRow {
    pub id: String,
    pub name: String,
    pub artist_ids: Vec<String>,
    pub image_url: Option<String>,
    pub release_date: Option<String>,
}

impl From<&PlayEvent> for PlayRow {
    fn from(play: &PlayEvent) -> Self {
        PlayRow {
            user_id: play.user_id.clone(),
            track_id: play.track_id.clone(),
            played_at: play.played_at.clone(),
        }
    }
}

impl From<&Track> for TrackRow {
    fn from(track: &Track) -> Self {
        TrackRow {
            id: track.id.clone(),
            name: track.name.clone(),
            duration_ms: track.duration_ms,
            album_id: track.album.id.clone(),
            artist_ids: track.artists.iter().map(|artist| artist.id.clone()).collect(),
        }
    }
}

impl From<&Artist> for ArtistRow {
    fn from(artist: &Artist) -> Self {
        ArtistRow {
            id: artist.id.clone(),
            name: artist.name.clone(),
            genres: artist.genres.clone(),
            image_url: artist.image_url.clone(),
        }
    }
}

impl From<&Album> for AlbumRow {
    fn from(album: &Album) -> Self {
        AlbumRow {
            id: album.id.clone(),
            name: album.name.clone(),
            artist_ids: album.artists.iter().map(|artist| artist.id.clone()).collect(),
            image_url: album.image_url.clone(),
            release_date: album.release_date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_row_flattens_album_and_artists_to_ids() {
        let track = Track {
            id: "t1".into(),
            name: "Song".into(),
            duration_ms: 1000,
            album: Album {
                id: "al1".into(),
                name: "Album".into(),
                artists: vec![],
                image_url: None,
                release_date: None,
            },
            artists: vec![
                Artist {
                    id: "a1".into(),
                    name: "First".into(),
                    genres: vec![],
                    image_url: None,
                },
                Artist {
                    id: "a2".into(),
                    name: "Second".into(),
                    genres: vec![],
                    image_url: None,
                },
            ],
        };

        let row = TrackRow::from(&track);
        assert_eq!(row.album_id, "al1");
        assert_eq!(row.artist_ids, vec!["a1", "a2"]);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["artist_ids"][0], "a1");
    }
}
