use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{TrailerError, TrailerResult};

const PROVIDER: &str = "Apify";

/// Lifecycle state of an actor run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RunStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    Aborting,
    Aborted,
    TimingOut,
    TimedOut,
    Other(String),
}

impl From<String> for RunStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "READY" => Self::Ready,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "ABORTING" => Self::Aborting,
            "ABORTED" => Self::Aborted,
            "TIMING-OUT" => Self::TimingOut,
            "TIMED-OUT" => Self::TimedOut,
            _ => Self::Other(raw),
        }
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Aborting => "ABORTING",
            Self::Aborted => "ABORTED",
            Self::TimingOut => "TIMING-OUT",
            Self::TimedOut => "TIMED-OUT",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub id: String,
    pub status: RunStatus,
    pub default_dataset_id: String,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: RunInfo,
}

/// The three calls a scrape needs: start a run, check on it, read its dataset.
#[async_trait]
pub trait ScrapeJobs: Send + Sync {
    async fn start_run(&self, profile_url: &str) -> TrailerResult<RunInfo>;
    async fn run_status(&self, run_id: &str) -> TrailerResult<RunInfo>;
    async fn dataset_items(&self, dataset_id: &str) -> TrailerResult<Vec<Value>>;
}

pub struct ApifyClient {
    client: Client,
    base_url: String,
    token: String,
    actor_id: String,
}

impl ApifyClient {
    pub fn new(client: Client, base_url: &str, token: &str, actor_id: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            actor_id: actor_id.to_string(),
        }
    }

    async fn read_run(resp: reqwest::Response, what: &str) -> TrailerResult<RunInfo> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrailerError::provider(
                PROVIDER,
                format!("{what}: HTTP {} {body}", status.as_u16()),
            ));
        }
        let envelope: RunEnvelope = resp.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ScrapeJobs for ApifyClient {
    async fn start_run(&self, profile_url: &str) -> TrailerResult<RunInfo> {
        let url = format!("{}/v2/acts/{}/runs", self.base_url, self.actor_id);
        let resp = self
            .client
            .post(url)
            .query(&[("token", &self.token)])
            .json(&json!({ "profileUrls": [profile_url] }))
            .send()
            .await?;
        Self::read_run(resp, "Failed to start scraper").await
    }

    async fn run_status(&self, run_id: &str) -> TrailerResult<RunInfo> {
        let url = format!("{}/v2/actor-runs/{run_id}", self.base_url);
        let resp = self
            .client
            .get(url)
            .query(&[("token", &self.token)])
            .send()
            .await?;
        Self::read_run(resp, "Failed to check run status").await
    }

    async fn dataset_items(&self, dataset_id: &str) -> TrailerResult<Vec<Value>> {
        let url = format!("{}/v2/datasets/{dataset_id}/items", self.base_url);
        let resp = self
            .client
            .get(url)
            .query(&[("token", &self.token)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TrailerError::provider(
                PROVIDER,
                format!("Failed to fetch results: HTTP {}", status.as_u16()),
            ));
        }
        Ok(resp.json().await?)
    }
}
