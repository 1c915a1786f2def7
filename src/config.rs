use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::error::{TrailerError, TrailerResult};

/// How the media directory answers lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Any file of the requested kind is a hit. Development convenience only.
    Shared,
    /// Files are named by a fingerprint of (kind, prompt, references).
    Keyed,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" | "any" => Ok(Self::Shared),
            "keyed" | "content" => Ok(Self::Keyed),
            other => Err(format!("unknown media cache mode: {other}")),
        }
    }
}

/// Which prompt the video stage sends to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPromptMode {
    /// The constant camera directive, regardless of scene.
    Fixed,
    /// The scene's own prompt.
    Scene,
}

impl FromStr for VideoPromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "scene" => Ok(Self::Scene),
            other => Err(format!("unknown video prompt mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub apify_token: Option<String>,
    pub apify_actor_id: String,
    pub apify_base_url: String,

    pub gemini_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,

    pub fal_key: Option<String>,
    pub fal_queue_url: String,
    pub fal_image_model: String,
    pub fal_video_model: String,

    pub elevenlabs_key: Option<String>,
    pub eleven_voice_id: Option<String>,
    pub eleven_model_id: String,
    pub elevenlabs_base_url: String,

    pub demo_video_url: Option<String>,

    pub media_dir: PathBuf,
    pub cache_mode: CacheMode,
    pub scenes_path: PathBuf,
    pub script_prompt_path: PathBuf,
    pub max_parallel_generations: usize,
    pub video_prompt_mode: VideoPromptMode,
}

fn default_actor_id() -> String {
    "dev_fusion~linkedin-profile-scraper".to_string()
}

fn default_model_id() -> String {
    "eleven_v3".to_string()
}

impl Config {
    /// Reads the process environment once. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = match get("API_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("API_PORT is not a port number: {raw}"))?,
            None => 3000,
        };
        let max_parallel_generations = match get("MAX_PARALLEL_GENERATIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MAX_PARALLEL_GENERATIONS is not a number: {raw}"))?,
            None => 4,
        };
        let cache_mode = match get("MEDIA_CACHE_MODE") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            None => CacheMode::Keyed,
        };
        let video_prompt_mode = match get("VIDEO_PROMPT_MODE") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            None => VideoPromptMode::Fixed,
        };

        Ok(Self {
            host: or("API_HOST", "0.0.0.0"),
            port,
            apify_token: get("APIFY_API_TOKEN"),
            apify_actor_id: get("APIFY_ACTOR_ID").unwrap_or_else(default_actor_id),
            apify_base_url: or("APIFY_BASE_URL", "https://api.apify.com"),
            gemini_key: get("GEMINI_API_KEY"),
            gemini_model: or("GEMINI_MODEL", "gemini-3-pro-preview"),
            gemini_base_url: or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            fal_key: get("FAL_KEY"),
            fal_queue_url: or("FAL_QUEUE_URL", "https://queue.fal.run"),
            fal_image_model: or("FAL_IMAGE_MODEL", "fal-ai/nano-banana/edit"),
            fal_video_model: or("FAL_VIDEO_MODEL", "fal-ai/veo3.1/fast/image-to-video"),
            elevenlabs_key: get("ELEVENLABS_API_KEY"),
            eleven_voice_id: get("VOICE_ID_MORGAN"),
            eleven_model_id: get("ELEVENLABS_MODEL_ID").unwrap_or_else(default_model_id),
            elevenlabs_base_url: or("ELEVENLABS_BASE_URL", "https://api.elevenlabs.io"),
            demo_video_url: get("DEMO_VIDEO_URL"),
            media_dir: PathBuf::from(or("MEDIA_DIR", "generatedMedia")),
            cache_mode,
            scenes_path: PathBuf::from(or("SCENES_PATH", "prompting/dicaprio-input.json")),
            script_prompt_path: PathBuf::from(or(
                "SCRIPT_PROMPT_PATH",
                "prompting/agent-system-prompt-v1.md",
            )),
            max_parallel_generations,
            video_prompt_mode,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn require_apify(&self) -> TrailerResult<&str> {
        self.apify_token
            .as_deref()
            .ok_or_else(|| TrailerError::configuration("Apify API token not configured"))
    }

    pub fn require_gemini(&self) -> TrailerResult<&str> {
        self.gemini_key
            .as_deref()
            .ok_or_else(|| TrailerError::configuration("Gemini API key not configured"))
    }

    pub fn require_fal(&self) -> TrailerResult<&str> {
        self.fal_key
            .as_deref()
            .ok_or_else(|| TrailerError::configuration("fal.ai API key not configured"))
    }
}
