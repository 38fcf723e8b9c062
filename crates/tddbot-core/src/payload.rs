use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level Linear webhook envelope.
///
/// Every field here is required; a body that parses as JSON but is missing
/// one of them is rejected as a malformed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearWebhookPayload {
    pub action: String,
    pub data: Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    pub organization_id: String,
    pub webhook_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A newly created comment, flattened out of the webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentEvent {
    pub comment_id: String,
    pub issue_id: String,
    pub project_id: Option<String>,
    pub author_id: Option<String>,
    pub author_name: String,
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
struct CommentData {
    id: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    issue: Option<IssueData>,
    #[serde(default)]
    user: Option<UserData>,
}

#[derive(Debug, Default, Deserialize)]
struct IssueData {
    id: Option<String>,
    #[serde(default)]
    project: Option<IdOnly>,
}

#[derive(Debug, Default, Deserialize)]
struct IdOnly {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UserData {
    id: Option<String>,
    name: Option<String>,
}

impl LinearWebhookPayload {
    pub fn is_comment_create(&self) -> bool {
        self.kind == "Comment" && self.action == "create"
    }

    /// Extract the comment this webhook announces.
    ///
    /// `None` for anything other than `Comment`/`create`, and when the
    /// comment id or issue id is missing or empty.
    pub fn comment_event(&self) -> Option<CommentEvent> {
        if !self.is_comment_create() {
            return None;
        }
        let data: CommentData = match serde_json::from_value(self.data.clone()) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "error parsing comment data from payload");
                return None;
            }
        };

        let comment_id = non_empty(data.id);
        let issue = data.issue.unwrap_or_default();
        let issue_id = non_empty(issue.id);
        let (Some(comment_id), Some(issue_id)) = (comment_id, issue_id) else {
            tracing::error!("missing required comment data in webhook payload");
            return None;
        };
        let user = data.user.unwrap_or_default();

        Some(CommentEvent {
            comment_id,
            issue_id,
            project_id: non_empty(issue.project.and_then(|p| p.id)),
            author_id: non_empty(user.id),
            author_name: user.name.unwrap_or_else(|| "Unknown".to_string()),
            body: data.body.unwrap_or_default(),
        })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.is_empty())
}
