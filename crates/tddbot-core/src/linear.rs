use crate::error::{Result, TddError};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_LINEAR_API_URL: &str = "https://api.linear.app/graphql";

const COMMENT_CREATE: &str = r#"
mutation CommentCreate($issueId: String!, $body: String!) {
  commentCreate(input: {issueId: $issueId, body: $body}) {
    success
    comment { id }
  }
}
"#;

/// Posts markdown comments onto Linear issues through the GraphQL API.
pub struct LinearClient {
    http: Client,
    api_key: String,
    api_url: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<CommentCreateData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentCreateData {
    comment_create: Option<CommentCreatePayload>,
}

#[derive(Deserialize)]
struct CommentCreatePayload {
    success: bool,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl LinearClient {
    pub fn new(api_key: impl Into<String>, api_url: Option<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: api_url.unwrap_or_else(|| DEFAULT_LINEAR_API_URL.to_string()),
        })
    }

    pub fn add_comment(&self, issue_id: &str, body: &str) -> Result<()> {
        let payload = json!({
            "query": COMMENT_CREATE,
            "variables": { "issueId": issue_id, "body": body },
        });
        let resp: GraphQlResponse = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?
            .error_for_status()?
            .json()?;

        let succeeded = resp
            .data
            .and_then(|d| d.comment_create)
            .is_some_and(|c| c.success);
        if !succeeded {
            let detail = resp
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TddError::Api(format!("commentCreate was not successful: {detail}")));
        }

        info!(issue_id, "comment added to issue");
        Ok(())
    }
}
