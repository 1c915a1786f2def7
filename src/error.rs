use std::path::PathBuf;

use thiserror::Error;

use crate::media_cache::MediaKind;

pub type TrailerResult<T> = Result<T, TrailerError>;

#[derive(Debug, Error)]
pub enum TrailerError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Please enter a valid URL")]
    InvalidUrl,

    #[error("Please enter a valid LinkedIn profile URL (e.g., linkedin.com/in/username)")]
    NotAProfile,

    #[error("{0}")]
    Configuration(String),

    #[error("{provider} request failed: {message}")]
    ProviderRequest {
        provider: &'static str,
        message: String,
    },

    #[error("Scraper timed out")]
    ScrapeTimeout,

    /// Carries the provider status in lower case, e.g. `failed`.
    #[error("Scraper run {0}")]
    ScrapeFailed(String),

    #[error("No {0} URL found in provider response")]
    NoResultUrl(MediaKind),

    #[error("Failed to fetch generated {kind} from {url}: HTTP {status}")]
    Fetch {
        kind: MediaKind,
        url: String,
        status: u16,
    },

    #[error("At least one reference image is required for video generation")]
    MissingReference,

    #[error("No profile picture found")]
    MissingProfilePicture,

    #[error("No videos to stitch")]
    NothingToStitch,

    #[error("Failed to read {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrailerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderRequest {
            provider,
            message: message.into(),
        }
    }

    /// Stable machine-readable code, exposed next to the message on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            TrailerError::InvalidInput(_) => "invalid_input",
            TrailerError::InvalidUrl => "invalid_url",
            TrailerError::NotAProfile => "not_a_linkedin_profile",
            TrailerError::Configuration(_) => "configuration",
            TrailerError::ProviderRequest { .. } => "provider_request",
            TrailerError::ScrapeTimeout => "scrape_timeout",
            TrailerError::ScrapeFailed(_) => "scrape_failed",
            TrailerError::NoResultUrl(_) => "no_result_url",
            TrailerError::Fetch { .. } => "fetch",
            TrailerError::MissingReference => "missing_reference",
            TrailerError::MissingProfilePicture => "missing_profile_picture",
            TrailerError::NothingToStitch => "nothing_to_stitch",
            TrailerError::Resource { .. } => "resource",
            TrailerError::Transport(_) => "transport",
            TrailerError::Io(_) => "io",
            TrailerError::Json(_) => "json",
        }
    }

    /// True when the caller supplied malformed data.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrailerError::InvalidInput(_) | TrailerError::InvalidUrl | TrailerError::NotAProfile
        )
    }
}
