mod config;
mod logging;
mod model;
mod normalize;
mod ports;
mod spotify;
mod storage;
mod sync;
mod token_cache;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use crate::{
    config::Config,
    logging::setup_logging,
    ports::storage::StorageGateway,
    spotify::client::{SpotifyApi, SpotifyApiCredentials},
    storage::client::SupabaseStorage,
    sync::{SyncService, UserSyncOutcome},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    /// Supabase service role key
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    supabase_service_key: String,

    /// Spotify application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    spotify_client_id: String,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    spotify_client_secret: String,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "PLAYSYNC_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync recently played tracks for all users (the default)
    Sync {
        /// Repeat the run with this period instead of exiting, e.g. "1h"
        #[arg(long, value_parser = humantime::parse_duration)]
        every: Option<Duration>,
    },
    /// Recompute aggregate play counts in storage
    RecountPlays,
    /// Print a user's currently playing track
    NowPlaying {
        /// The profile id of the user
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Playsync starting");

    let config = Config::new(
        &args.supabase_url,
        args.supabase_service_key,
        args.spotify_client_id,
        args.spotify_client_secret,
    )?;

    let spotify_api = SpotifyApi::new(SpotifyApiCredentials::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
    ));
    let storage = Arc::new(SupabaseStorage::new(
        config.supabase_url.clone(),
        config.supabase_service_key.clone(),
    ));
    let service = SyncService::new(Arc::new(spotify_api.clone()), storage.clone());

    match args.command.unwrap_or(Commands::Sync { every: None }) {
        Commands::Sync { every } => loop {
            let outcomes = service.sync_all_users().await?;

            let failed = outcomes.values().filter(|o| o.is_err()).count();
            let written = outcomes
                .values()
                .filter(|o| matches!(o, Ok(UserSyncOutcome::Written(_))))
                .count();
            log::info!(
                "Run complete: {} users processed ({} with new plays), {} failed",
                outcomes.len(),
                written,
                failed
            );

            match every {
                Some(period) => {
                    log::debug!("Next run in {}", humantime::format_duration(period));
                    tokio::time::sleep(period).await;
                }
                None => break,
            }
        },
        Commands::RecountPlays => {
            let result = storage.recompute_play_counts().await?;
            log::info!("Recomputed play counts for {} users", result.users_updated);
        }
        Commands::NowPlaying { user } => {
            let profile = service.user_by_id(&user).await?;
            let access_token = service.access_token_for(&profile).await?;

            match spotify_api.get_currently_playing(&access_token).await? {
                Some(playing) => match playing.item {
                    Some(track) => {
                        let artists = track
                            .artists
                            .iter()
                            .map(|artist| artist.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        let state = if playing.is_playing { "playing" } else { "paused" };
                        println!("{} - {} [{}] ({})", artists, track.name, track.album.name, state);
                    }
                    None => println!("Nothing playing"),
                },
                None => println!("Nothing playing"),
            }
        }
    }

    Ok(())
}
