use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::{BulkInsertResult, PlayCountsResult, SyncBatch, UserProfile};
use crate::ports::storage::StorageGateway;
use crate::storage::rows::{AlbumRow, ArtistRow, PlayRow, TrackRow};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
    #[error("Unexpected response code {code} from {context}")]
    UnexpectedResponseCode { context: &'static str, code: u16 },
    #[error("Storage transaction failed: {message}")]
    TransactionFailed { message: String },
    #[error("Failed to encode rpc payload: {0}")]
    FailedToEncodePayload(#[from] serde_json::Error),
}

/// Parameters of the `insert_user_plays` procedure. Each `*_data` field is
/// a JSON-encoded array string, the shape the procedure unpacks server
/// side.
#[derive(Debug, Serialize)]
struct BulkWriteParams {
    user_plays_data: String,
    unseen_tracks_data: String,
    unseen_artists_data: String,
    unseen_albums_data: String,
    user_id: String,
    current_fetch_ts: String,
}

impl BulkWriteParams {
    fn from_batch(batch: &SyncBatch) -> Result<Self, StorageError> {
        let plays: Vec<PlayRow> = batch.plays.iter().map(PlayRow::from).collect();
        let tracks: Vec<TrackRow> = batch.unseen_tracks.iter().map(TrackRow::from).collect();
        let artists: Vec<ArtistRow> = batch.unseen_artists.iter().map(ArtistRow::from).collect();
        let albums: Vec<AlbumRow> = batch.unseen_albums.iter().map(AlbumRow::from).collect();

        Ok(BulkWriteParams {
            user_plays_data: serde_json::to_string(&plays)?,
            unseen_tracks_data: serde_json::to_string(&tracks)?,
            unseen_artists_data: serde_json::to_string(&artists)?,
            unseen_albums_data: serde_json::to_string(&albums)?,
            user_id: batch.user_id.clone(),
            current_fetch_ts: batch.fetched_at.to_rfc3339(),
        })
    }
}

/// Ids per `in.(...)` filter, keeping each lookup URL short.
const IN_FILTER_CHUNK: usize = 50;

fn quoted_id_list(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("\"{}\"", id))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Deserialize)]
struct WatermarkRow {
    plays_last_fetched: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// Typed wrapper around the Supabase/PostgREST persistence layer.
#[derive(Clone)]
pub struct SupabaseStorage {
    http: reqwest::Client,
    base_url: Url,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: Url, service_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            service_key,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.get(self.endpoint(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.post(self.endpoint(path)))
    }

    fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.patch(self.endpoint(path)))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}rest/v1/{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .timeout(Duration::from_secs(10))
    }

    async fn fetch_profiles(&self, filter: &str) -> Result<Vec<UserProfile>, StorageError> {
        let response = self
            .get(&format!(
                "profiles?select=id,spotify_user_id,refresh_token,plays_last_fetched{filter}"
            ))
            .send()
            .await
            .map_err(StorageError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(StorageError::UnexpectedResponseCode {
                context: "profiles",
                code: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(StorageError::FailedToParseResponse)
    }
}

#[async_trait::async_trait]
impl StorageGateway for SupabaseStorage {
    async fn list_syncable_users(&self) -> Result<Vec<UserProfile>> {
        Ok(self.fetch_profiles("").await?)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let filter = format!("&id=eq.{}", urlencoding::encode(user_id));
        let mut profiles = self.fetch_profiles(&filter).await?;
        Ok(if profiles.is_empty() {
            None
        } else {
            Some(profiles.swap_remove(0))
        })
    }

    async fn get_watermark(&self, user_id: &str) -> Result<Option<i64>> {
        let response = self
            .get(&format!(
                "profiles?select=plays_last_fetched&id=eq.{}",
                urlencoding::encode(user_id)
            ))
            .send()
            .await
            .map_err(StorageError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(StorageError::UnexpectedResponseCode {
                context: "watermark read",
                code: response.status().as_u16(),
            }
            .into());
        }

        let rows: Vec<WatermarkRow> = response
            .json()
            .await
            .map_err(StorageError::FailedToParseResponse)?;
        Ok(rows.into_iter().next().and_then(|row| row.plays_last_fetched))
    }

    async fn get_existing_track_ids(&self, candidate_ids: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        // A multi-page delta can carry hundreds of candidate ids; one
        // `in.(...)` filter with all of them would overflow common URL
        // limits, so the lookup is chunked like the Spotify batch
        // endpoints.
        for chunk in candidate_ids.chunks(IN_FILTER_CHUNK) {
            let response = self
                .get(&format!(
                    "tracks?select=id&id=in.({})",
                    urlencoding::encode(&quoted_id_list(chunk))
                ))
                .send()
                .await
                .map_err(StorageError::FailedToSendRequest)?;

            if !response.status().is_success() {
                return Err(StorageError::UnexpectedResponseCode {
                    context: "existing track ids",
                    code: response.status().as_u16(),
                }
                .into());
            }

            let rows: Vec<IdRow> = response
                .json()
                .await
                .map_err(StorageError::FailedToParseResponse)?;
            existing.extend(rows.into_iter().map(|row| row.id));
        }

        Ok(existing)
    }

    async fn bulk_write_plays(&self, batch: &SyncBatch) -> Result<BulkInsertResult> {
        let params = BulkWriteParams::from_batch(batch)?;

        let response = self
            .post("rpc/insert_user_plays")
            .json(&params)
            .send()
            .await
            .map_err(StorageError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(StorageError::UnexpectedResponseCode {
                context: "insert_user_plays",
                code: response.status().as_u16(),
            }
            .into());
        }

        let result: BulkInsertResult = response
            .json()
            .await
            .map_err(StorageError::FailedToParseResponse)?;

        if result.status == "error" {
            return Err(StorageError::TransactionFailed {
                message: result
                    .error
                    .unwrap_or_else(|| "no error message returned".to_string()),
            }
            .into());
        }

        Ok(result)
    }

    async fn touch_watermark_only(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let response = self
            .patch(&format!("profiles?id=eq.{}", urlencoding::encode(user_id)))
            .json(&serde_json::json!({ "plays_last_fetched": now.timestamp_millis() }))
            .send()
            .await
            .map_err(StorageError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(StorageError::UnexpectedResponseCode {
                context: "watermark touch",
                code: response.status().as_u16(),
            }
            .into());
        }

        Ok(())
    }

    async fn recompute_play_counts(&self) -> Result<PlayCountsResult> {
        let response = self
            .post("rpc/recompute_play_counts")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(StorageError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(StorageError::UnexpectedResponseCode {
                context: "recompute_play_counts",
                code: response.status().as_u16(),
            }
            .into());
        }

        let result: PlayCountsResult = response
            .json()
            .await
            .map_err(StorageError::FailedToParseResponse)?;

        if result.status == "error" {
            return Err(StorageError::TransactionFailed {
                message: result
                    .error
                    .unwrap_or_else(|| "no error message returned".to_string()),
            }
            .into());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Album, Artist, PlayEvent, Track};
    use chrono::TimeZone;

    fn sample_batch() -> SyncBatch {
        let artist = Artist {
            id: "a1".into(),
            name: "Artist".into(),
            genres: vec!["indie".into()],
            image_url: None,
        };
        let album = Album {
            id: "al1".into(),
            name: "Album".into(),
            artists: vec![artist.clone()],
            image_url: None,
            release_date: Some("2020-01-01".into()),
        };
        let track = Track {
            id: "t1".into(),
            name: "Song".into(),
            duration_ms: 1000,
            album: album.clone(),
            artists: vec![artist.clone()],
        };

        SyncBatch {
            user_id: "user-1".into(),
            plays: vec![PlayEvent {
                user_id: "user-1".into(),
                track_id: "t1".into(),
                played_at: "2026-08-26T10:00:00.000Z".into(),
            }],
            unseen_tracks: vec![track],
            unseen_artists: vec![artist],
            unseen_albums: vec![album],
            fetched_at: Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn bulk_write_params_encode_rows_as_json_strings() {
        let params = BulkWriteParams::from_batch(&sample_batch()).unwrap();

        assert_eq!(params.user_id, "user-1");
        assert_eq!(params.current_fetch_ts, "2026-08-26T12:00:00+00:00");

        // Each payload field is itself a JSON array string
        let plays: serde_json::Value = serde_json::from_str(&params.user_plays_data).unwrap();
        assert_eq!(plays[0]["track_id"], "t1");

        let tracks: serde_json::Value = serde_json::from_str(&params.unseen_tracks_data).unwrap();
        assert_eq!(tracks[0]["album_id"], "al1");
        assert_eq!(tracks[0]["artist_ids"][0], "a1");

        let artists: serde_json::Value =
            serde_json::from_str(&params.unseen_artists_data).unwrap();
        assert_eq!(artists[0]["genres"][0], "indie");

        let albums: serde_json::Value = serde_json::from_str(&params.unseen_albums_data).unwrap();
        assert_eq!(albums[0]["release_date"], "2020-01-01");
    }

    #[test]
    fn existing_id_filter_quotes_and_joins() {
        let ids = vec!["t1".to_string(), "t2".to_string()];
        assert_eq!(quoted_id_list(&ids), "\"t1\",\"t2\"");
    }

    #[test]
    fn existing_id_lookup_is_chunked() {
        let ids: Vec<String> = (0..120).map(|n| format!("t{n}")).collect();

        let chunks: Vec<&[String]> = ids.chunks(IN_FILTER_CHUNK).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.len() <= IN_FILTER_CHUNK));

        // No chunk's filter approaches common URL length limits
        let longest = chunks
            .iter()
            .map(|chunk| quoted_id_list(chunk).len())
            .max()
            .unwrap();
        assert!(longest < 2000);
    }

    #[test]
    fn empty_batch_encodes_empty_arrays() {
        let mut batch = sample_batch();
        batch.plays.clear();
        batch.unseen_tracks.clear();
        batch.unseen_artists.clear();
        batch.unseen_albums.clear();

        let params = BulkWriteParams::from_batch(&batch).unwrap();
        assert_eq!(params.user_plays_data, "[]");
        assert_eq!(params.unseen_tracks_data, "[]");
    }
}
