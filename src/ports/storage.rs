use std::collections::HashSet;

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;

use crate::model::{BulkInsertResult, PlayCountsResult, SyncBatch, UserProfile};

/// Port trait over the persistence backend.
///
/// The bulk write is one remote procedure call that is transactional on
/// the server side: all rows for the call commit or none do. This system
/// never issues partial writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StorageGateway: Send + Sync {
    async fn list_syncable_users(&self) -> Result<Vec<UserProfile>>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Millis since epoch, `None` if the user has never synced.
    async fn get_watermark(&self, user_id: &str) -> Result<Option<i64>>;

    /// Which of the candidate ids are already present in the store.
    async fn get_existing_track_ids(&self, candidate_ids: &[String]) -> Result<HashSet<String>>;

    /// The single write entry point; advances the watermark atomically
    /// with the inserts.
    async fn bulk_write_plays(&self, batch: &SyncBatch) -> Result<BulkInsertResult>;

    /// Watermark-only update for the empty-delta path.
    async fn touch_watermark_only(&self, user_id: &str, now: DateTime<Utc>) -> Result<()>;

    async fn recompute_play_counts(&self) -> Result<PlayCountsResult>;
}
