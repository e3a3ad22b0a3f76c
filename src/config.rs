use color_eyre::eyre::{Result, WrapErr};
use url::Url;

/// Process configuration, collected once at startup and passed into the
/// components that need it. Business logic never reads ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: Url,
    pub supabase_service_key: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
}

impl Config {
    pub fn new(
        supabase_url: &str,
        supabase_service_key: String,
        spotify_client_id: String,
        spotify_client_secret: String,
    ) -> Result<Self> {
        let mut supabase_url =
            Url::parse(supabase_url).wrap_err("SUPABASE_URL is not a valid URL")?;
        // Endpoint paths are appended to this base
        if !supabase_url.path().ends_with('/') {
            let path = format!("{}/", supabase_url.path());
            supabase_url.set_path(&path);
        }

        Ok(Config {
            supabase_url,
            supabase_service_key,
            spotify_client_id,
            spotify_client_secret,
        })
    }
}
