use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio::fs;
use tracing::info;

use profile_trailer::media_cache::decode_data_url;
use profile_trailer::script::ScriptOutcome;
use profile_trailer::{AppState, Config, init, init_tracing};

#[derive(Parser)]
#[command(name = "trailer-cli", about = "Run the trailer pipeline from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a profile and print the cleaned JSON
    Profile { url: String },
    /// Scrape a profile and print the generated movie script
    Script { url: String },
    /// Run the full pipeline and write the resulting clip
    Movie {
        url: String,
        #[arg(short, long, default_value = "trailer.mp4")]
        out: PathBuf,
    },
    /// Synthesize a voiceover
    Speak {
        text: String,
        #[arg(short, long, default_value = "voiceover.mp3")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("Invalid configuration")?;
    init::ensure_directories(&config).await?;
    init::check_resources(&config);
    let state = AppState::from_config(config)?;

    match cli.command {
        Command::Profile { url } => {
            state.config.require_apify()?;
            let profile = state.profiles.fetch(&url).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Script { url } => {
            state.config.require_apify()?;
            state.config.require_gemini()?;
            let profile = state.profiles.fetch(&url).await?;
            match state.scripts.generate(&profile).await? {
                ScriptOutcome::Parsed(script) => {
                    println!("{}", serde_json::to_string_pretty(&script)?)
                }
                ScriptOutcome::Raw { text, parse_error } => {
                    eprintln!("[WARNING] {parse_error}");
                    println!("{text}");
                }
            }
        }
        Command::Movie { url, out } => {
            state.config.require_apify()?;
            state.config.require_fal()?;
            let video = state.director.create_movie(&url).await?;
            let (mime, bytes) =
                decode_data_url(&video).ok_or_else(|| anyhow!("Pipeline returned a non-data URL"))?;
            fs::write(&out, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} ({mime}, {} bytes)", out.display(), bytes.len());
        }
        Command::Speak { text, out } => {
            let audio = state.voice.synthesize(&text).await?;
            fs::write(&out, &audio)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} ({} bytes)", out.display(), audio.len());
        }
    }
    Ok(())
}
