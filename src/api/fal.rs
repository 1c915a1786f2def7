use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{TrailerError, TrailerResult};
use crate::media_cache::MediaKind;

const PROVIDER: &str = "fal.ai";

/// Submits a generation request and waits until the provider reports a result payload.
#[async_trait]
pub trait GenerationQueue: Send + Sync {
    async fn subscribe(&self, model: &str, input: Value) -> TrailerResult<Value>;
}

/// Bytes behind a result URL.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, kind: MediaKind, url: &str) -> TrailerResult<FetchedMedia>;
}

#[derive(Debug, Deserialize)]
struct QueueTicket {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueLog {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
    #[serde(default)]
    logs: Option<Vec<QueueLog>>,
}

pub struct FalClient {
    client: Client,
    queue_url: String,
    key: String,
    poll_interval: Duration,
}

impl FalClient {
    pub fn new(client: Client, queue_url: &str, key: &str) -> Self {
        Self {
            client,
            queue_url: queue_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn auth(&self) -> String {
        format!("Key {}", self.key)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        what: &str,
    ) -> TrailerResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrailerError::provider(
                PROVIDER,
                format!("{what}: HTTP {} {body}", status.as_u16()),
            ));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl GenerationQueue for FalClient {
    async fn subscribe(&self, model: &str, input: Value) -> TrailerResult<Value> {
        let resp = self
            .client
            .post(format!("{}/{model}", self.queue_url))
            .header("Authorization", self.auth())
            .json(&input)
            .send()
            .await?;
        let ticket: QueueTicket = Self::read_json(resp, "Failed to submit request").await?;
        info!("Submitted {model} request {}", ticket.request_id);

        // fal replays the full log on every status call; only print what is new.
        let mut seen_logs = 0usize;
        loop {
            let resp = self
                .client
                .get(&ticket.status_url)
                .query(&[("logs", "1")])
                .header("Authorization", self.auth())
                .send()
                .await?;
            let status: QueueStatus = Self::read_json(resp, "Failed to check request status").await?;

            if let Some(logs) = status.logs.as_deref() {
                for line in logs.iter().skip(seen_logs) {
                    info!("[{model}] {}", line.message);
                }
                seen_logs = seen_logs.max(logs.len());
            }

            match status.status.as_str() {
                "COMPLETED" => break,
                other => debug!("{model} request {} is {other}", ticket.request_id),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let resp = self
            .client
            .get(&ticket.response_url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        Self::read_json(resp, "Failed to fetch result").await
    }
}

pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, kind: MediaKind, url: &str) -> TrailerResult<FetchedMedia> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TrailerError::Fetch {
                kind,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        Ok(FetchedMedia {
            bytes,
            content_type,
        })
    }
}
