use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::apify::ApifyClient;
use crate::api::elevenlabs::{ElevenLabsClient, SpeechSynthesizer};
use crate::api::fal::{FalClient, HttpMediaFetcher};
use crate::api::gemini::GeminiClient;
use crate::config::Config;
use crate::director::MovieDirector;
use crate::error::TrailerError;
use crate::media::{ImageGenerator, VideoGenerator};
use crate::media_cache::MediaCache;
use crate::scenes::load_scenes;
use crate::script::{ScriptGenerator, ScriptOutcome};
use crate::scraper::{ProfileFetcher, ProfileSource};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profiles: Arc<dyn ProfileSource>,
    pub director: Arc<MovieDirector>,
    pub scripts: Arc<ScriptGenerator>,
    pub voice: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    /// Wires the real provider clients. Missing credentials are not an error
    /// here; each route checks for the ones it needs per request.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let apify = ApifyClient::new(
            client.clone(),
            &config.apify_base_url,
            config.apify_token.as_deref().unwrap_or_default(),
            &config.apify_actor_id,
        );
        let profiles: Arc<dyn ProfileSource> = Arc::new(ProfileFetcher::new(Arc::new(apify)));

        let fal = Arc::new(FalClient::new(
            client.clone(),
            &config.fal_queue_url,
            config.fal_key.as_deref().unwrap_or_default(),
        ));
        let fetcher = Arc::new(HttpMediaFetcher::new(client.clone()));
        let cache = Arc::new(MediaCache::new(&config.media_dir, config.cache_mode));
        let images = ImageGenerator::new(
            fal.clone(),
            fetcher.clone(),
            cache.clone(),
            &config.fal_image_model,
        );
        let videos = VideoGenerator::new(
            fal,
            fetcher,
            cache,
            &config.fal_video_model,
            config.video_prompt_mode,
        );

        let scenes = load_scenes(&config.scenes_path)
            .with_context(|| format!("Failed to load scenes from {}", config.scenes_path.display()))?;
        info!("Loaded {} scenes", scenes.len());
        let director = MovieDirector::new(
            Arc::clone(&profiles),
            Arc::new(images),
            Arc::new(videos),
            scenes,
        )
        .with_max_parallel(config.max_parallel_generations);

        let gemini = GeminiClient::new(
            client.clone(),
            &config.gemini_base_url,
            config.gemini_key.as_deref().unwrap_or_default(),
            &config.gemini_model,
        );
        let scripts = ScriptGenerator::new(Arc::new(gemini), &config.script_prompt_path);
        let voice = ElevenLabsClient::new(client, &config);

        Ok(Self {
            config: Arc::new(config),
            profiles,
            director: Arc::new(director),
            scripts: Arc::new(scripts),
            voice: Arc::new(voice),
        })
    }
}

/// Error body: the message plus a stable `kind` code.
pub struct ApiError(TrailerError);

impl From<TrailerError> for ApiError {
    fn from(err: TrailerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedinRequest {
    #[serde(default)]
    pub linkedin_url: Option<String>,
}

impl LinkedinRequest {
    fn required_url(&self) -> Result<&str, TrailerError> {
        self.linkedin_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TrailerError::invalid_input("LinkedIn URL is required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    success: bool,
    video_url: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/demo-video", get(demo_video))
        .route("/api/generate-video", post(generate_video))
        .route("/api/linkedin", post(linkedin))
        .route("/api/script", post(script))
        .route("/api/tts", post(tts))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Trailer API listening on http://{addr}");
    axum::serve(listener, create_router(state))
        .await
        .context("Server error")
}

async fn health() -> &'static str {
    "ok"
}

async fn demo_video(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "videoUrl": state.config.demo_video_url }))
}

async fn generate_video(
    State(state): State<AppState>,
    Json(req): Json<LinkedinRequest>,
) -> ApiResult<Json<VideoResponse>> {
    info!("Starting movie generation");
    state.config.require_apify()?;
    state.config.require_fal()?;
    let url = req.required_url()?;

    let video_url = state.director.create_movie(url).await?;
    Ok(Json(VideoResponse {
        success: true,
        video_url,
    }))
}

async fn linkedin(
    State(state): State<AppState>,
    Json(req): Json<LinkedinRequest>,
) -> ApiResult<Json<Value>> {
    state.config.require_apify()?;
    let url = req.linkedin_url.as_deref().unwrap_or_default();
    let profile = state.profiles.fetch(url).await?;
    Ok(Json(json!({ "data": profile })))
}

async fn script(
    State(state): State<AppState>,
    Json(req): Json<LinkedinRequest>,
) -> ApiResult<Json<Value>> {
    state.config.require_apify()?;
    state.config.require_gemini()?;
    let url = req.required_url()?;

    let profile = state.profiles.fetch(url).await?;
    let body = match state.scripts.generate(&profile).await? {
        ScriptOutcome::Parsed(script) => json!({
            "success": true,
            "profile": profile,
            "script": script,
        }),
        ScriptOutcome::Raw { text, parse_error } => json!({
            "success": true,
            "profile": profile,
            "script": text,
            "parseError": parse_error,
        }),
    };
    Ok(Json(body))
}

async fn tts(State(state): State<AppState>, Json(req): Json<TtsRequest>) -> ApiResult<Response> {
    // Non-string text is treated like missing text.
    let text = req.text.as_ref().and_then(Value::as_str).unwrap_or_default();
    let audio = state.voice.synthesize(text).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_LENGTH, audio.len().to_string()),
        ],
        audio,
    )
        .into_response())
}
