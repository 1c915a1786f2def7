//! Image and video generation through the fal.ai queue, fronted by the media cache.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::api::fal::{GenerationQueue, MediaFetcher};
use crate::config::VideoPromptMode;
use crate::error::{TrailerError, TrailerResult};
use crate::media_cache::{CacheKey, MediaCache, MediaKind, encode_data_url};

const IMAGE_ASPECT_RATIO: &str = "16:9";

pub const VIDEO_DIRECTIVE: &str = "make it cinematic and dynamic. the character should NOT talk, \
and the camera movements should be clearly visible.";

static ANY_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^"]+"#).expect("valid regex"));
static MP4_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^"]+\.mp4"#).expect("valid regex"));

/// One way of locating the result URL in a provider payload.
///
/// The scan variants exist because the response shape is not pinned down by the
/// provider; a scan hit is a guess, not a contract.
#[derive(Debug, Clone, Copy)]
pub enum UrlStrategy {
    /// JSON pointer to a string field, e.g. `/image/url`.
    Pointer(&'static str),
    /// First `http(s)` URL anywhere in the serialized payload.
    ScanAny,
    /// First `http(s)` URL ending in `.mp4` in the serialized payload.
    ScanMp4,
}

pub const IMAGE_URL_STRATEGIES: &[UrlStrategy] = &[
    UrlStrategy::Pointer("/image/url"),
    UrlStrategy::Pointer("/images/0/url"),
    UrlStrategy::ScanAny,
];

pub const VIDEO_URL_STRATEGIES: &[UrlStrategy] = &[
    UrlStrategy::Pointer("/video/url"),
    UrlStrategy::Pointer("/url"),
    UrlStrategy::ScanMp4,
];

impl UrlStrategy {
    fn apply(self, payload: &Value) -> Option<String> {
        match self {
            UrlStrategy::Pointer(pointer) => payload
                .pointer(pointer)
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            UrlStrategy::ScanAny => scan(&ANY_URL, payload),
            UrlStrategy::ScanMp4 => scan(&MP4_URL, payload),
        }
    }
}

fn scan(pattern: &Regex, payload: &Value) -> Option<String> {
    let serialized = serde_json::to_string(payload).ok()?;
    pattern.find(&serialized).map(|m| m.as_str().to_string())
}

/// Tries each strategy in order; the first hit wins.
pub fn extract_result_url(payload: &Value, strategies: &[UrlStrategy]) -> Option<String> {
    strategies.iter().enumerate().find_map(|(idx, strategy)| {
        let url = strategy.apply(payload)?;
        if matches!(strategy, UrlStrategy::ScanAny | UrlStrategy::ScanMp4) {
            warn!("Result URL found only by scanning the payload (strategy {idx})");
        }
        Some(url)
    })
}

/// Reference media plus a prompt in, one data URL out.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    async fn generate(&self, reference_images: &[String], prompt: &str) -> TrailerResult<String>;
}

pub struct ImageGenerator {
    queue: Arc<dyn GenerationQueue>,
    fetcher: Arc<dyn MediaFetcher>,
    cache: Arc<MediaCache>,
    model: String,
}

impl ImageGenerator {
    pub fn new(
        queue: Arc<dyn GenerationQueue>,
        fetcher: Arc<dyn MediaFetcher>,
        cache: Arc<MediaCache>,
        model: &str,
    ) -> Self {
        Self {
            queue,
            fetcher,
            cache,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl MediaGenerator for ImageGenerator {
    async fn generate(&self, reference_images: &[String], prompt: &str) -> TrailerResult<String> {
        let key = CacheKey::new(MediaKind::Image, prompt, reference_images);
        let _build = self.cache.lock(&key).await;
        if let Some(cached) = self.cache.find_existing(&key).await {
            info!("Using cached image instead of generating a new one");
            return Ok(cached);
        }

        info!(
            "Generating image with {} from {} references",
            self.model,
            reference_images.len()
        );
        let input = json!({
            "prompt": prompt,
            "image_urls": reference_images,
            "aspect_ratio": IMAGE_ASPECT_RATIO,
        });
        let payload = self.queue.subscribe(&self.model, input).await?;
        let url = extract_result_url(&payload, IMAGE_URL_STRATEGIES)
            .ok_or(TrailerError::NoResultUrl(MediaKind::Image))?;
        info!("Provider returned image URL: {url}");

        let media = self.fetcher.fetch(MediaKind::Image, &url).await?;
        let mime = media.content_type.as_deref().unwrap_or("image/png");
        let data_url = encode_data_url(mime, &media.bytes);
        self.cache
            .store(&key, &media.bytes, MediaKind::Image.extension_for_mime(mime))
            .await?;
        Ok(data_url)
    }
}

pub struct VideoGenerator {
    queue: Arc<dyn GenerationQueue>,
    fetcher: Arc<dyn MediaFetcher>,
    cache: Arc<MediaCache>,
    model: String,
    prompt_mode: VideoPromptMode,
}

impl VideoGenerator {
    pub fn new(
        queue: Arc<dyn GenerationQueue>,
        fetcher: Arc<dyn MediaFetcher>,
        cache: Arc<MediaCache>,
        model: &str,
        prompt_mode: VideoPromptMode,
    ) -> Self {
        Self {
            queue,
            fetcher,
            cache,
            model: model.to_string(),
            prompt_mode,
        }
    }

    fn provider_prompt<'a>(&self, scene_prompt: &'a str) -> &'a str {
        match self.prompt_mode {
            VideoPromptMode::Fixed => VIDEO_DIRECTIVE,
            VideoPromptMode::Scene => scene_prompt,
        }
    }
}

#[async_trait]
impl MediaGenerator for VideoGenerator {
    async fn generate(&self, reference_images: &[String], prompt: &str) -> TrailerResult<String> {
        let image_ref = reference_images
            .first()
            .ok_or(TrailerError::MissingReference)?;
        let sent_prompt = self.provider_prompt(prompt);

        let key = CacheKey::new(MediaKind::Video, sent_prompt, &reference_images[..1]);
        let _build = self.cache.lock(&key).await;
        if let Some(cached) = self.cache.find_existing(&key).await {
            info!("Using cached video instead of generating a new one");
            return Ok(cached);
        }

        if image_ref.starts_with("data:") {
            warn!("Reference image is an inline data URL; the provider expects a fetchable URL");
        }

        info!("Generating video with {}", self.model);
        let input = json!({
            "prompt": sent_prompt,
            "image_url": image_ref,
        });
        let payload = self.queue.subscribe(&self.model, input).await?;
        let url = extract_result_url(&payload, VIDEO_URL_STRATEGIES)
            .ok_or(TrailerError::NoResultUrl(MediaKind::Video))?;
        info!("Provider returned video URL: {url}");

        let media = self.fetcher.fetch(MediaKind::Video, &url).await?;
        self.cache.store(&key, &media.bytes, "mp4").await?;
        Ok(encode_data_url("video/mp4", &media.bytes))
    }
}
