use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{TrailerError, TrailerResult};

const OUTPUT_FORMAT: &str = "mp3_44100_128";

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns MP3 bytes for the given text.
    async fn synthesize(&self, text: &str) -> TrailerResult<Bytes>;
}

pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    voice_id: Option<String>,
    model_id: String,
}

impl ElevenLabsClient {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.elevenlabs_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.elevenlabs_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> TrailerResult<Bytes> {
        let (Some(api_key), Some(voice_id)) = (self.api_key.as_deref(), self.voice_id.as_deref())
        else {
            return Err(TrailerError::configuration(
                "ElevenLabs API key or voice ID not configured",
            ));
        };
        if text.trim().is_empty() {
            return Err(TrailerError::invalid_input("Text is required"));
        }

        let url = format!("{}/v1/text-to-speech/{voice_id}", self.base_url);
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(url)
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("ElevenLabs TTS failed HTTP {}", status.as_u16());
            let raw = resp.text().await.unwrap_or_default();
            return Err(TrailerError::provider(
                "ElevenLabs",
                format!("HTTP {} {raw}", status.as_u16()),
            ));
        }

        let mut audio = BytesMut::new();
        let mut chunks = resp.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            audio.extend_from_slice(&chunk?);
        }
        info!("ElevenLabs returned {} bytes of audio", audio.len());
        Ok(audio.freeze())
    }
}
