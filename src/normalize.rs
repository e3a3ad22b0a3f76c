//! Pure batch normalization: dedup of provider entities and projection of
//! play rows. No I/O.
//!
//! Dedup is keyed on provider id, insertion-order-stable and first-wins:
//! when the provider returns stale and fresh payloads for the same id
//! within one run, the first one encountered is kept.

use std::collections::HashSet;

use crate::model::{Album, Artist, PlayEvent, PlayedItem, Track};

/// Dedup tracks by id, keeping the first occurrence.
pub fn dedup_tracks(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

/// Dedup albums referenced by the given tracks, keeping the first
/// occurrence. Each album carries its artist list for link rows.
pub fn dedup_albums(tracks: &[Track]) -> Vec<Album> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .map(|track| &track.album)
        .filter(|album| seen.insert(album.id.clone()))
        .cloned()
        .collect()
}

/// Union of all artists referenced by the tracks and by the albums,
/// deduped by id with track artists first.
pub fn dedup_artists(tracks: &[Track], albums: &[Album]) -> Vec<Artist> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .flat_map(|track| track.artists.iter())
        .chain(albums.iter().flat_map(|album| album.artists.iter()))
        .filter(|artist| seen.insert(artist.id.clone()))
        .cloned()
        .collect()
}

/// 1:1 projection of history items into play rows. No dedup: a user may
/// legitimately play the same track twice.
pub fn to_play_rows(items: &[PlayedItem], user_id: &str) -> Vec<PlayEvent> {
    items
        .iter()
        .map(|item| PlayEvent {
            user_id: user_id.to_string(),
            track_id: item.track.id.clone(),
            played_at: item.played_at.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(id: &str, name: &str) -> Artist {
        Artist {
            id: id.into(),
            name: name.into(),
            genres: vec![],
            image_url: None,
        }
    }

    fn album(id: &str, name: &str, artists: Vec<Artist>) -> Album {
        Album {
            id: id.into(),
            name: name.into(),
            artists,
            image_url: None,
            release_date: None,
        }
    }

    fn track(id: &str, name: &str, album: Album, artists: Vec<Artist>) -> Track {
        Track {
            id: id.into(),
            name: name.into(),
            duration_ms: 200_000,
            album,
            artists,
        }
    }

    #[test]
    fn dedup_tracks_keeps_first_occurrence() {
        let first = track("T1", "Stale Name", album("AL1", "Album", vec![]), vec![]);
        let second = track("T1", "Fresh Name", album("AL1", "Album", vec![]), vec![]);
        let other = track("T2", "Other", album("AL2", "Album 2", vec![]), vec![]);

        let deduped = dedup_tracks(vec![first, second, other]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, "T1");
        assert_eq!(deduped[0].name, "Stale Name");
        assert_eq!(deduped[1].id, "T2");
    }

    #[test]
    fn dedup_albums_is_order_stable() {
        let tracks = vec![
            track("T1", "One", album("AL2", "Second Album", vec![]), vec![]),
            track("T2", "Two", album("AL1", "First Album", vec![]), vec![]),
            track("T3", "Three", album("AL2", "Second Album Again", vec![]), vec![]),
        ];

        let albums = dedup_albums(&tracks);

        assert_eq!(
            albums.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["AL2", "AL1"]
        );
        assert_eq!(albums[0].name, "Second Album");
    }

    #[test]
    fn dedup_artists_unions_tracks_and_albums() {
        let shared = artist("A1", "Shared");
        let tracks = vec![track(
            "T1",
            "One",
            album("AL1", "Album", vec![artist("A2", "Album Only")]),
            vec![shared.clone(), artist("A3", "Track Only")],
        )];
        let albums = dedup_albums(&tracks);

        let artists = dedup_artists(&tracks, &albums);

        assert_eq!(
            artists.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["A1", "A3", "A2"]
        );
    }

    #[test]
    fn play_rows_are_not_deduped() {
        let t = track("T1", "Repeat", album("AL1", "Album", vec![]), vec![]);
        let items = vec![
            PlayedItem {
                track: t.clone(),
                played_at: "2026-08-26T10:00:00Z".into(),
            },
            PlayedItem {
                track: t,
                played_at: "2026-08-26T11:00:00Z".into(),
            },
        ];

        let rows = to_play_rows(&items, "user-1");

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.user_id == "user-1"));
        assert!(rows.iter().all(|r| r.track_id == "T1"));
        assert_ne!(rows[0].played_at, rows[1].played_at);
    }
}
