use std::hash::{Hash, Hasher};

use serde::Deserialize;

/// Canonical artist shape shared by every Spotify endpoint variant.
///
/// The simplified artist objects embedded in tracks and albums carry no
/// genres or images; the full objects from `/v1/artists` do. Both map into
/// this one type.
#[derive(Debug, Clone)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub image_url: Option<String>,
}

/// Canonical album shape, carrying its artist list for link-table rows.
#[derive(Debug, Clone)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artists: Vec<Artist>,
    pub image_url: Option<String>,
    pub release_date: Option<String>,
}

/// Canonical track shape.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub album: Album,
    pub artists: Vec<Artist>,
}

// Equality and hashing are id-only: the provider returns drifting payloads
// for the same entity across endpoints, and two objects with the same id
// are interchangeable.
macro_rules! id_keyed {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }
        impl Eq for $ty {}
        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
    };
}

id_keyed!(Artist);
id_keyed!(Album);
id_keyed!(Track);

/// One entry from a user's recently-played history.
#[derive(Debug, Clone)]
pub struct PlayedItem {
    pub track: Track,
    /// Provider-native timestamp string, stored as-is.
    pub played_at: String,
}

/// A single play row, written once and never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEvent {
    pub user_id: String,
    pub track_id: String,
    pub played_at: String,
}

/// A user profile row as read from storage. Rows are provisioned by the
/// onboarding flow; the watermark is the only field this job mutates.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub spotify_user_id: String,
    pub refresh_token: Option<String>,
    /// Millis since epoch; `None` means never synced.
    pub plays_last_fetched: Option<i64>,
}

/// Everything the bulk-write RPC needs for one user's sync pass.
#[derive(Debug, Clone)]
pub struct SyncBatch {
    pub user_id: String,
    pub plays: Vec<PlayEvent>,
    pub unseen_tracks: Vec<Track>,
    pub unseen_artists: Vec<Artist>,
    pub unseen_albums: Vec<Album>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

/// The only acknowledgment the bulk write returns; there is no per-row
/// result.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkInsertResult {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub artists_inserted: i64,
    #[serde(default)]
    pub albums_inserted: i64,
    #[serde(default)]
    pub tracks_inserted: i64,
    #[serde(default)]
    pub links_inserted: i64,
    #[serde(default)]
    pub plays_inserted: i64,
}

/// Response of the `recompute_play_counts` RPC.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayCountsResult {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub users_updated: i64,
}
