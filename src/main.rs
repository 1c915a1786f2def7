use anyhow::{Context, Result};
use tracing::{info, warn};

use profile_trailer::{AppState, Config, init, init_tracing, server};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("Failed to read .env");
        }
    }
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    init::ensure_directories(&config).await?;
    if !init::check_resources(&config).is_empty() {
        warn!("Some routes will fail until the missing resources are in place");
    }
    for (name, set) in [
        ("APIFY_API_TOKEN", config.apify_token.is_some()),
        ("GEMINI_API_KEY", config.gemini_key.is_some()),
        ("FAL_KEY", config.fal_key.is_some()),
        ("ELEVENLABS_API_KEY", config.elevenlabs_key.is_some()),
    ] {
        if !set {
            warn!("{name} is not set");
        }
    }

    info!(
        "Media cache: {} ({:?}), video prompts: {:?}",
        config.media_dir.display(),
        config.cache_mode,
        config.video_prompt_mode
    );
    let state = AppState::from_config(config)?;
    server::serve(state).await
}
