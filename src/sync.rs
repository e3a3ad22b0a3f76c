//! Per-user synchronization pipeline and the run-level fan-out over users.
//!
//! Each eligible user runs as an independent task: load watermark, refresh
//! token, fetch the delta, resolve unseen metadata, bulk-write. A failure
//! anywhere in one user's pipeline is logged and skipped; it never aborts
//! another user's task or the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Result, WrapErr, eyre};

use crate::model::{BulkInsertResult, SyncBatch, UserProfile};
use crate::normalize;
use crate::ports::spotify::SpotifyClient;
use crate::ports::storage::StorageGateway;
use crate::spotify::client::SpotifyError;
use crate::token_cache::TokenCache;

/// What one user's pipeline produced.
#[derive(Debug)]
pub enum UserSyncOutcome {
    /// Provider returned zero new plays; only the watermark was touched.
    NothingToSync,
    /// The bulk write committed with these counts.
    Written(BulkInsertResult),
}

pub struct SyncService<C, S> {
    spotify: Arc<C>,
    storage: Arc<S>,
    tokens: Arc<TokenCache>,
}

impl<C, S> Clone for SyncService<C, S> {
    fn clone(&self) -> Self {
        Self {
            spotify: self.spotify.clone(),
            storage: self.storage.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<C, S> SyncService<C, S>
where
    C: SpotifyClient + 'static,
    S: StorageGateway + 'static,
{
    pub fn new(spotify: Arc<C>, storage: Arc<S>) -> Self {
        Self {
            spotify,
            storage,
            tokens: Arc::new(TokenCache::new()),
        }
    }

    /// One full run: fan out one task per token-holding user and gather
    /// the outcomes into an unordered map keyed by user id.
    ///
    /// Only a failure to list users aborts the run; per-user failures are
    /// logged and isolated.
    pub async fn sync_all_users(&self) -> Result<HashMap<String, Result<UserSyncOutcome>>> {
        let users = self
            .storage
            .list_syncable_users()
            .await
            .wrap_err("Failed to list syncable users")?;

        // Watermarks advance to the start of the run, not to per-user
        // completion times.
        let run_started_at = Utc::now();

        let mut handles = Vec::with_capacity(users.len());
        for user in users {
            if user.refresh_token.is_none() {
                log::info!("Skipping user {} without refresh token", user.id);
                continue;
            }

            let service = self.clone();
            handles.push(tokio::spawn(async move {
                let user_id = user.id.clone();
                let outcome = service.sync_user(user, run_started_at).await;
                (user_id, outcome)
            }));
        }

        let mut outcomes = HashMap::new();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok((user_id, outcome)) => {
                    match &outcome {
                        Ok(UserSyncOutcome::NothingToSync) => {
                            log::debug!("No new plays for user {}", user_id)
                        }
                        Ok(UserSyncOutcome::Written(result)) => log::info!(
                            "Synced user {}: {} plays, {} new tracks",
                            user_id,
                            result.plays_inserted,
                            result.tracks_inserted
                        ),
                        Err(error) => log::error!("Sync failed for user {}: {:#}", user_id, error),
                    }
                    outcomes.insert(user_id, outcome);
                }
                Err(join_error) => log::error!("User sync task panicked: {}", join_error),
            }
        }

        Ok(outcomes)
    }

    /// The per-user pipeline, strictly sequential: watermark, token,
    /// delta, unseen metadata, bulk write.
    pub async fn sync_user(
        &self,
        user: UserProfile,
        run_started_at: DateTime<Utc>,
    ) -> Result<UserSyncOutcome> {
        log::debug!(
            "Syncing user {} (spotify account {})",
            user.id,
            user.spotify_user_id
        );

        let refresh_token = user
            .refresh_token
            .as_deref()
            .ok_or(SpotifyError::MissingRefreshToken)?;

        let after_millis = self
            .storage
            .get_watermark(&user.id)
            .await
            .wrap_err("Failed to read watermark")?
            .unwrap_or(0);

        let access_token = self
            .spotify
            .refresh_access_token(refresh_token)
            .await
            .wrap_err("Failed to refresh access token")?;
        self.tokens.insert(user.id.clone(), access_token.clone());

        let items = self
            .spotify
            .recently_played(&access_token, after_millis)
            .await
            .wrap_err("Failed to fetch recently played")?;

        if items.is_empty() {
            // Still advance the watermark so the same empty window is not
            // re-scanned forever.
            self.storage
                .touch_watermark_only(&user.id, run_started_at)
                .await
                .wrap_err("Failed to touch watermark")?;
            return Ok(UserSyncOutcome::NothingToSync);
        }

        log::debug!(
            "User {}: {} plays since watermark {}",
            user.id,
            items.len(),
            after_millis
        );

        let plays = normalize::to_play_rows(&items, &user.id);

        // Unique track ids in first-seen order
        let mut seen = HashSet::new();
        let candidate_ids: Vec<String> = items
            .iter()
            .map(|item| item.track.id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let existing = self
            .storage
            .get_existing_track_ids(&candidate_ids)
            .await
            .wrap_err("Failed to look up existing track ids")?;
        let unseen_ids: Vec<String> = candidate_ids
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();

        // Already-known tracks are referenced by id in play rows only;
        // their metadata is not re-fetched.
        let unseen_tracks = if unseen_ids.is_empty() {
            vec![]
        } else {
            let fetched = self
                .spotify
                .tracks_by_ids(&access_token, &unseen_ids)
                .await
                .wrap_err("Failed to fetch track metadata")?;
            normalize::dedup_tracks(fetched)
        };

        let unseen_albums = normalize::dedup_albums(&unseen_tracks);
        let artist_ids: Vec<String> = normalize::dedup_artists(&unseen_tracks, &unseen_albums)
            .into_iter()
            .map(|artist| artist.id)
            .collect();
        let unseen_artists = if artist_ids.is_empty() {
            vec![]
        } else {
            self.spotify
                .artists_by_ids(&access_token, &artist_ids)
                .await
                .wrap_err("Failed to fetch artist metadata")?
        };

        let batch = SyncBatch {
            user_id: user.id.clone(),
            plays,
            unseen_tracks,
            unseen_artists,
            unseen_albums,
            fetched_at: run_started_at,
        };

        let result = self
            .storage
            .bulk_write_plays(&batch)
            .await
            .wrap_err("Bulk write failed")?;

        Ok(UserSyncOutcome::Written(result))
    }

    /// Currently-playing lookup shares the pipeline's token handling:
    /// reuse a cached access token when one exists, refresh otherwise.
    pub async fn access_token_for(&self, user: &UserProfile) -> Result<String> {
        if let Some(token) = self.tokens.get(&user.id) {
            return Ok(token);
        }

        let refresh_token = user
            .refresh_token
            .as_deref()
            .ok_or(SpotifyError::MissingRefreshToken)?;
        let access_token = self
            .spotify
            .refresh_access_token(refresh_token)
            .await
            .wrap_err("Failed to refresh access token")?;
        self.tokens.insert(user.id.clone(), access_token.clone());
        Ok(access_token)
    }

    pub async fn user_by_id(&self, user_id: &str) -> Result<UserProfile> {
        self.storage
            .get_user(user_id)
            .await
            .wrap_err("Failed to fetch user profile")?
            .ok_or_else(|| eyre!("No profile found for user {}", user_id))
    }
}
