use crate::error::ClaudeError;
use crate::types::{ErrorEnvelope, InputMessage, MessagesRequest, MessagesResponse};
use crate::Result;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Connection and sampling settings.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Base URL without the `/v1/messages` suffix.
    pub api_url: String,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

pub struct ClaudeClient {
    http: Client,
    config: ClaudeConfig,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ClaudeError::MissingApiKey);
        }
        // `None` also lifts reqwest's default 30s blocking timeout.
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    /// Send one system + user turn.
    pub fn complete(&self, system: &str, user: &str) -> Result<MessagesResponse> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![InputMessage::user(user)],
        };
        let url = format!("{}/v1/messages", self.config.api_url.trim_end_matches('/'));
        debug!(model = %request.model, url = %url, "sending messages request");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;

        if !status.is_success() {
            let (kind, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => (env.error.kind, env.error.message),
                Err(_) => ("unknown".to_string(), body),
            };
            return Err(ClaudeError::Api {
                status: status.as_u16(),
                kind,
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|source| ClaudeError::Parse { body, source })?;
        info!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "messages response received"
        );
        Ok(parsed)
    }

    /// Like [`complete`](Self::complete) but returns only the first text
    /// block. `Ok(None)` when the response had no text.
    pub fn generate_text(&self, system: &str, user: &str) -> Result<Option<String>> {
        let resp = self.complete(system, user)?;
        Ok(resp.first_text().map(str::to_string))
    }
}
