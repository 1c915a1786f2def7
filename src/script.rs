use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::api::gemini::LanguageModel;
use crate::error::{TrailerError, TrailerResult};
use crate::linkedin::ProfileClean;

pub const PARSE_ERROR: &str = "Could not parse response as JSON";

/// What the language model handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    Parsed(Value),
    /// The reply was not JSON; the text is still worth showing.
    Raw { text: String, parse_error: String },
}

pub struct ScriptGenerator {
    model: Arc<dyn LanguageModel>,
    template_path: PathBuf,
}

impl ScriptGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            model,
            template_path: template_path.into(),
        }
    }

    pub async fn generate(&self, profile: &ProfileClean) -> TrailerResult<ScriptOutcome> {
        let system_prompt = fs::read_to_string(&self.template_path)
            .await
            .map_err(|source| TrailerError::Resource {
                path: self.template_path.clone(),
                source,
            })?;

        let user_message = format!(
            "Generate the movie script JSON for this LinkedIn profile:\n\n{}",
            serde_json::to_string_pretty(profile)?
        );

        info!("Requesting movie script");
        let reply = self.model.complete(&system_prompt, &user_message).await?;
        let outcome = parse_script_reply(&reply);
        if let ScriptOutcome::Raw { .. } = outcome {
            warn!("Script reply was not valid JSON; returning raw text");
        }
        Ok(outcome)
    }
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE_RE: OnceCell<Regex> = OnceCell::new();
    FENCE_RE
        .get_or_try_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```"))
        .ok()
}

/// Unwraps the first fenced block (if any) and parses it as JSON.
pub fn parse_script_reply(reply: &str) -> ScriptOutcome {
    let body = fence_regex()
        .and_then(|re| re.captures(reply))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(reply);

    match serde_json::from_str(body) {
        Ok(value) => ScriptOutcome::Parsed(value),
        Err(_) => ScriptOutcome::Raw {
            text: body.to_string(),
            parse_error: PARSE_ERROR.to_string(),
        },
    }
}
