use color_eyre::eyre::Result;

use crate::model::{Artist, PlayedItem, Track};

/// Port trait wrapping the Spotify API capabilities used by the sync
/// pipeline, expressed in canonical model types.
///
/// Implementations live in `spotify::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    /// Exchange a refresh token for an access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String>;

    /// Plays newer than `after_millis`, in provider order.
    async fn recently_played(
        &self,
        access_token: &str,
        after_millis: i64,
    ) -> Result<Vec<PlayedItem>>;

    /// Batch metadata lookup; empty input returns empty without I/O.
    async fn tracks_by_ids(&self, access_token: &str, ids: &[String]) -> Result<Vec<Track>>;

    /// Batch artist lookup; empty input returns empty without I/O.
    async fn artists_by_ids(&self, access_token: &str, ids: &[String]) -> Result<Vec<Artist>>;
}
