use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;

pub async fn ensure_directories(config: &Config) -> Result<()> {
    let dir = &config.media_dir;
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;
        info!("Created directory: {}", dir.display());
    }
    Ok(())
}

/// Returns the resource files that are missing, logging a warning for each.
pub fn check_resources(config: &Config) -> Vec<&Path> {
    let mut missing = Vec::new();
    for (label, path) in [
        ("scene file", config.scenes_path.as_path()),
        ("script template", config.script_prompt_path.as_path()),
    ] {
        if !path.is_file() {
            warn!("{label} not found at {}", path.display());
            missing.push(path);
        }
    }
    missing
}
