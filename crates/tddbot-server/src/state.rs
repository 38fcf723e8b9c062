use crate::dispatch::Dispatch;
use std::sync::Arc;
use tddbot_core::config::ProjectStore;
use tddbot_core::signature::SignatureValidator;
use tddbot_core::slack::SlackClient;

/// Bot credentials for replying into Slack threads.
#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub token: String,
    pub api_url: Option<String>,
}

impl SlackSettings {
    /// Blocking client; build it on a blocking thread, never inside the runtime.
    pub fn client(&self) -> tddbot_core::Result<SlackClient> {
        SlackClient::new(self.token.clone(), self.api_url.clone())
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProjectStore>,
    pub linear_validator: SignatureValidator,
    pub slack_signing_secret: Option<String>,
    pub slack: Option<SlackSettings>,
    pub dispatcher: Arc<dyn Dispatch>,
}

impl AppState {
    pub fn new(store: ProjectStore, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            store: Arc::new(store),
            linear_validator: SignatureValidator::default(),
            slack_signing_secret: None,
            slack: None,
            dispatcher,
        }
    }

    pub fn with_linear_secret(mut self, secret: Option<String>) -> Self {
        self.linear_validator = SignatureValidator::new(secret);
        self
    }

    pub fn with_slack_signing_secret(mut self, secret: Option<String>) -> Self {
        self.slack_signing_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_slack(mut self, settings: Option<SlackSettings>) -> Self {
        self.slack = settings.filter(|s| !s.token.is_empty());
        self
    }
}
