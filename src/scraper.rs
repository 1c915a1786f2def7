use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::apify::{RunStatus, ScrapeJobs};
use crate::error::{TrailerError, TrailerResult};
use crate::linkedin::{ProfileClean, ProfileRaw, normalize_profile_url};

/// How long to wait for a scrape run: `max_attempts` status checks, `interval` apart.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

/// Anything that can turn a profile URL into a clean profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch(&self, profile_url: &str) -> TrailerResult<ProfileClean>;
}

pub struct ProfileFetcher {
    jobs: Arc<dyn ScrapeJobs>,
    policy: PollPolicy,
}

impl ProfileFetcher {
    pub fn new(jobs: Arc<dyn ScrapeJobs>) -> Self {
        Self {
            jobs,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Polls until the run settles and returns its dataset id.
    async fn wait_for_run(&self, run_id: &str) -> TrailerResult<String> {
        for attempt in 1..=self.policy.max_attempts {
            let run = self.jobs.run_status(run_id).await?;
            match run.status {
                RunStatus::Succeeded => {
                    info!("Scrape run {run_id} succeeded after {attempt} checks");
                    return Ok(run.default_dataset_id);
                }
                RunStatus::Failed | RunStatus::Aborted => {
                    return Err(TrailerError::ScrapeFailed(
                        run.status.as_str().to_ascii_lowercase(),
                    ));
                }
                ref other => debug!("Scrape run {run_id} is {} (check {attempt})", other.as_str()),
            }
            tokio::time::sleep(self.policy.interval).await;
        }
        Err(TrailerError::ScrapeTimeout)
    }
}

#[async_trait]
impl ProfileSource for ProfileFetcher {
    async fn fetch(&self, profile_url: &str) -> TrailerResult<ProfileClean> {
        if profile_url.trim().is_empty() {
            return Err(TrailerError::invalid_input("LinkedIn URL is required"));
        }
        let profile_url = normalize_profile_url(profile_url)
            .map_err(|_| TrailerError::invalid_input("Invalid LinkedIn profile URL"))?;

        info!("Scraping LinkedIn profile {profile_url}");
        let run = self.jobs.start_run(&profile_url).await?;
        let dataset_id = self.wait_for_run(&run.id).await?;

        let record = self
            .jobs
            .dataset_items(&dataset_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TrailerError::provider("Apify", format!("dataset {dataset_id} is empty"))
            })?;
        let raw: ProfileRaw = serde_json::from_value(record)?;

        let clean = ProfileClean::from(raw);
        info!(
            "Scraped profile of {}",
            clean.full_name.as_deref().unwrap_or("<unnamed>")
        );
        Ok(clean)
    }
}
