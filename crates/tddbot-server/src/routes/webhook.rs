use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tddbot_core::mention::find_mentions;
use tddbot_core::payload::LinearWebhookPayload;
use tddbot_core::task::WorkflowTask;
use tracing::{error, info, warn};

use crate::dispatch::DispatchRequest;
use crate::error::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "Linear-Signature";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: String,
    pub dispatched: bool,
}

impl WebhookResponse {
    fn accepted(message: impl Into<String>, dispatched: bool) -> Json<Self> {
        Json(Self {
            status: "accepted",
            message: message.into(),
            dispatched,
        })
    }
}

/// POST /webhook/linear: dispatch one agent task per `@mention` in a new
/// comment.
///
/// Answers as soon as the tasks are spawned; the workflows report back to
/// the issue on their own.
pub async fn linear_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !app.linear_validator.is_valid(&body, signature) {
        warn!("rejected webhook with invalid signature");
        return Err(AppError::unauthorized("Invalid webhook signature"));
    }

    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "invalid JSON payload");
        AppError::bad_request("Invalid JSON payload")
    })?;
    let payload: LinearWebhookPayload = serde_json::from_value(value).map_err(|e| {
        error!(error = %e, "invalid webhook payload structure");
        AppError::bad_request("Invalid webhook payload structure")
    })?;

    let Some(comment) = payload.comment_event() else {
        info!(kind = %payload.kind, action = %payload.action, "webhook is not a processable comment event");
        return Ok(WebhookResponse::accepted("Webhook received but not a comment event", false));
    };

    let mentions = find_mentions(&comment.body);
    if mentions.is_empty() {
        info!(comment_id = %comment.comment_id, "no agent mentions found in comment");
        return Ok(WebhookResponse::accepted("No agent mentions found in comment", false));
    }

    let Some(project_id) = comment.project_id.as_deref() else {
        warn!(issue_id = %comment.issue_id, "no project id in comment data");
        return Ok(WebhookResponse::accepted("No project ID found in webhook", false));
    };
    let Some(project) = app.store.find_project_by_id(project_id) else {
        warn!(project_id, "unknown project id");
        return Ok(WebhookResponse::accepted(format!("Unknown project ID: {project_id}"), false));
    };

    let mut dispatched = 0usize;
    for mention in &mentions {
        let Some(agent) = project.find_agent_by_mention(mention) else {
            warn!(%mention, project = %project.project_name, "unknown agent mention");
            continue;
        };
        let task = WorkflowTask::for_agent(project, agent, comment.issue_id.clone(), comment.body.clone());
        match app.dispatcher.dispatch(&DispatchRequest::new(task)) {
            Ok(()) => {
                dispatched += 1;
                info!(%mention, issue_id = %comment.issue_id, "dispatched agent task");
            }
            Err(e) => error!(%mention, error = %e, "failed to dispatch agent task"),
        }
    }

    if dispatched > 0 {
        Ok(WebhookResponse::accepted(
            format!("Successfully dispatched {dispatched} agent task(s)"),
            true,
        ))
    } else {
        Ok(WebhookResponse::accepted("No valid agent mentions found for this project", false))
    }
}
