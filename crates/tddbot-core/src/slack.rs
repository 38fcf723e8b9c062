use crate::error::{Result, TddError};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Minimal Slack Web API client: thread replies and reactions.
pub struct SlackClient {
    http: Client,
    token: String,
    api_url: String,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackClient {
    pub fn new(token: impl Into<String>, api_url: Option<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            token: token.into(),
            api_url: api_url
                .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<()> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = json!(ts);
        }
        self.call("chat.postMessage", &body)?;
        info!(channel, "slack message sent");
        Ok(())
    }

    pub fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> Result<()> {
        let body = json!({ "channel": channel, "timestamp": timestamp, "name": name });
        self.call("reactions.add", &body)
    }

    fn call(&self, method: &str, body: &serde_json::Value) -> Result<()> {
        let resp: SlackResponse = self
            .http
            .post(format!("{}/{method}", self.api_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()?
            .error_for_status()?
            .json()?;
        if resp.ok {
            Ok(())
        } else {
            Err(TddError::Api(format!(
                "slack {method} failed: {}",
                resp.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn post_message_in_thread() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-1")
            .match_body(Matcher::Json(json!({
                "channel": "C1", "text": "🔄 hi", "thread_ts": "111.222"
            })))
            .with_body(r#"{"ok":true}"#)
            .create();

        let client = SlackClient::new("xoxb-1", Some(server.url())).unwrap();
        client.post_message("C1", "🔄 hi", Some("111.222")).unwrap();
        mock.assert();
    }

    #[test]
    fn not_ok_is_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat.postMessage")
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .create();

        let client = SlackClient::new("t", Some(format!("{}/", server.url()))).unwrap();
        let err = client.post_message("C9", "x", None).unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[test]
    fn add_reaction_calls_reactions_add() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/reactions.add")
            .match_body(Matcher::PartialJson(json!({ "name": "eyes" })))
            .with_body(r#"{"ok":true}"#)
            .create();

        let client = SlackClient::new("t", Some(server.url())).unwrap();
        client.add_reaction("C1", "1.2", "eyes").unwrap();
        mock.assert();
    }
}
