use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use serde_json::{Value, json};
use tower::ServiceExt;

use profile_trailer::api::elevenlabs::SpeechSynthesizer;
use profile_trailer::api::gemini::LanguageModel;
use profile_trailer::director::MovieDirector;
use profile_trailer::linkedin::{ProfileClean, ProfileRaw, normalize_profile_url};
use profile_trailer::media::MediaGenerator;
use profile_trailer::scenes::parse_scenes;
use profile_trailer::script::ScriptGenerator;
use profile_trailer::scraper::ProfileSource;
use profile_trailer::{AppState, Config, TrailerError, TrailerResult, create_router};

const SCENES: &str = r#"{
    "wolf": { "prompt": "trading floor", "movie_reference_image": "https://ref/wolf.jpg" },
    "gatsby": { "prompt": "champagne toast", "movie_reference_image": "https://ref/gatsby.jpg" }
}"#;

struct FakeProfiles {
    picture: Option<&'static str>,
}

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn fetch(&self, profile_url: &str) -> TrailerResult<ProfileClean> {
        let url = normalize_profile_url(profile_url)?;
        let raw: ProfileRaw = serde_json::from_value(json!({
            "linkedinUrl": url,
            "fullName": "Jane Doe",
            "headline": "Builder of things",
            "profilePicHighQuality": self.picture,
            "skills": [{ "title": "Rust" }, { "title": "Storytelling" }],
        }))?;
        Ok(raw.into())
    }
}

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
    prefix: &'static str,
}

#[async_trait]
impl MediaGenerator for CountingGenerator {
    async fn generate(&self, reference_images: &[String], prompt: &str) -> TrailerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}{}|{}", self.prefix, prompt, reference_images.join(",")))
    }
}

struct CannedModel(&'static str);

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, _system: &str, _user: &str) -> TrailerResult<String> {
        Ok(self.0.to_string())
    }
}

struct FakeVoice;

#[async_trait]
impl SpeechSynthesizer for FakeVoice {
    async fn synthesize(&self, text: &str) -> TrailerResult<Bytes> {
        if text.is_empty() {
            return Err(TrailerError::invalid_input("Text is required"));
        }
        Ok(Bytes::from_static(b"ID3fake-mp3"))
    }
}

struct Harness {
    app: Router,
    images: Arc<CountingGenerator>,
    videos: Arc<CountingGenerator>,
    _tmp: tempfile::TempDir,
}

fn harness(credentials: bool, picture: Option<&'static str>, reply: &'static str) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let template = tmp.path().join("prompt.md");
    std::fs::write(&template, "Write a trailer.").unwrap();

    let config = Config::from_lookup(|key| match key {
        "APIFY_API_TOKEN" | "GEMINI_API_KEY" | "FAL_KEY" if credentials => Some("test".into()),
        "DEMO_VIDEO_URL" => Some("https://cdn.example/demo.mp4".into()),
        _ => None,
    })
    .unwrap();

    let profiles: Arc<dyn ProfileSource> = Arc::new(FakeProfiles { picture });
    let images = Arc::new(CountingGenerator {
        prefix: "data:image/png;base64,",
        ..Default::default()
    });
    let videos = Arc::new(CountingGenerator {
        prefix: "data:video/mp4;base64,",
        ..Default::default()
    });
    let director = MovieDirector::new(
        Arc::clone(&profiles),
        images.clone(),
        videos.clone(),
        parse_scenes(SCENES).unwrap(),
    );

    let state = AppState {
        config: Arc::new(config),
        profiles,
        director: Arc::new(director),
        scripts: Arc::new(ScriptGenerator::new(Arc::new(CannedModel(reply)), &template)),
        voice: Arc::new(FakeVoice),
    };
    Harness {
        app: create_router(state),
        images,
        videos,
        _tmp: tmp,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn script_route_returns_profile_and_parsed_script() {
    let h = harness(
        true,
        Some("https://media/jane.jpg"),
        "```json\n{\"voiceover\": {\"fixed_intro\": \"In a world...\"}}\n```",
    );

    let response = h
        .app
        .oneshot(post_json(
            "/api/script",
            json!({ "linkedinUrl": "linkedin.com/in/jane-doe" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["profile"]["fullName"], "Jane Doe");
    assert_eq!(body["profile"]["linkedinUrl"], "https://linkedin.com/in/jane-doe");
    assert_eq!(body["profile"]["skills"], json!(["Rust", "Storytelling"]));
    assert_eq!(body["script"]["voiceover"]["fixed_intro"], "In a world...");
    assert!(body.get("parseError").is_none());
}

#[tokio::test]
async fn script_route_falls_back_to_raw_text() {
    let h = harness(true, None, "Sorry, no script today.");

    let response = h
        .app
        .oneshot(post_json(
            "/api/script",
            json!({ "linkedinUrl": "https://www.linkedin.com/in/jane" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["script"], "Sorry, no script today.");
    assert_eq!(body["parseError"], "Could not parse response as JSON");
}

#[tokio::test]
async fn generate_video_without_picture_fails_before_any_generation() {
    let h = harness(true, None, "{}");

    let response = h
        .app
        .oneshot(post_json(
            "/api/generate-video",
            json!({ "linkedinUrl": "https://linkedin.com/in/jane" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["error"], "No profile picture found");
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.videos.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generate_video_returns_the_first_clip() {
    let h = harness(true, Some("https://media/jane.jpg"), "{}");

    let response = h
        .app
        .oneshot(post_json(
            "/api/generate-video",
            json!({ "linkedinUrl": "https://linkedin.com/in/jane" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    let video = body["videoUrl"].as_str().unwrap();
    // First scene's clip, animated from its still.
    assert!(video.starts_with(
        "data:video/mp4;base64,trading floor|data:image/png;base64,trading floor|"
    ));
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.videos.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_credentials_are_server_errors() {
    for uri in ["/api/generate-video", "/api/linkedin", "/api/script"] {
        let h = harness(false, Some("https://media/jane.jpg"), "{}");
        let response = h
            .app
            .oneshot(post_json(uri, json!({ "linkedinUrl": "https://linkedin.com/in/jane" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let body = read_json(response).await;
        assert_eq!(body["kind"], "configuration", "{uri}");
        assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn missing_or_malformed_url_is_a_client_error() {
    let h = harness(true, None, "{}");
    let response = h
        .app
        .clone()
        .oneshot(post_json("/api/generate-video", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "LinkedIn URL is required");

    let response = h
        .app
        .oneshot(post_json(
            "/api/linkedin",
            json!({ "linkedinUrl": "https://example.com/in/jane" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn linkedin_route_wraps_the_profile() {
    let h = harness(true, Some("https://media/jane.jpg"), "{}");
    let response = h
        .app
        .oneshot(post_json(
            "/api/linkedin",
            json!({ "linkedinUrl": "https://linkedin.com/in/jane" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["profilePicHighQuality"], "https://media/jane.jpg");
}

#[tokio::test]
async fn tts_returns_mpeg_bytes() {
    let h = harness(true, None, "{}");
    let response = h
        .app
        .oneshot(post_json("/api/tts", json!({ "text": "In a world..." })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ID3fake-mp3");
}

#[tokio::test]
async fn tts_rejects_non_string_text() {
    let h = harness(true, None, "{}");
    let response = h
        .app
        .oneshot(post_json("/api/tts", json!({ "text": 42 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Text is required");
}

#[tokio::test]
async fn demo_and_health_routes() {
    let h = harness(false, None, "{}");
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/api/demo-video").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["videoUrl"], "https://cdn.example/demo.mp4");

    let response = h
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn bundled_scene_file_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("prompting/dicaprio-input.json");
    let json = std::fs::read_to_string(path).unwrap();
    let scenes = parse_scenes(&json).unwrap();
    assert_eq!(scenes.len(), 3);
    assert!(scenes.iter().all(|s| !s.spec.prompt.is_empty()));
}
