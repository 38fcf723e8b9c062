use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tddbot_core::chat::{plan_mention, AppMention, DISPATCH_FAILED_REPLY};
use tddbot_core::signature::verify_slack_signature;
use tddbot_core::task::WorkflowTask;
use tracing::{error, info, warn};

use crate::dispatch::DispatchRequest;
use crate::error::AppError;
use crate::state::AppState;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const RETRY_HEADER: &str = "X-Slack-Retry-Num";

/// Envelope of the Events API. Only the fields we branch on.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    event: Option<Value>,
}

/// POST /slack/events: Events API endpoint.
///
/// `app_mention` events are acknowledged immediately and handled on a
/// background task. Slack redelivers events not acknowledged within 3 s.
pub async fn slack_events(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = &app.slack_signing_secret {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let now = chrono::Utc::now().timestamp();
        if !verify_slack_signature(secret, header(TIMESTAMP_HEADER), &body, header(SIGNATURE_HEADER), now) {
            warn!("rejected slack event with invalid signature");
            return Err(AppError::unauthorized("Invalid request signature"));
        }
    }

    let envelope: EventEnvelope = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "invalid slack event payload");
        AppError::bad_request("Invalid JSON payload")
    })?;

    if envelope.kind == "url_verification" {
        return Ok(Json(json!({ "challenge": envelope.challenge.unwrap_or_default() })));
    }

    if let Some(retry) = headers.get(RETRY_HEADER).and_then(|v| v.to_str().ok()) {
        info!(retry, "ignoring slack retry delivery");
        return Ok(Json(json!({ "ok": true })));
    }

    if envelope.kind != "event_callback" {
        return Ok(Json(json!({ "ok": true })));
    }
    let Some(event) = envelope.event else {
        return Ok(Json(json!({ "ok": true })));
    };
    if event.get("type").and_then(Value::as_str) != Some("app_mention") {
        return Ok(Json(json!({ "ok": true })));
    }

    let mention: AppMention = serde_json::from_value(event).map_err(|e| {
        error!(error = %e, "malformed app_mention event");
        AppError::bad_request("Invalid webhook payload structure")
    })?;
    tokio::spawn(handle_mention(app, mention));

    Ok(Json(json!({ "ok": true })))
}

/// Resolve the mention, say what happens next in the thread, and dispatch.
pub async fn handle_mention(app: AppState, event: AppMention) {
    info!(channel = %event.channel, ts = %event.ts, "handling app mention");

    let planned = plan_mention(&app.store, &event).map(|plan| {
        let task = WorkflowTask::for_agent(
            plan.project,
            plan.agent,
            plan.issue_id.clone(),
            plan.task_description.clone(),
        );
        let request = DispatchRequest::new(task).with_chat_thread(event.channel.clone(), event.reply_ts());
        (plan.starting_reply(), request)
    });
    let (starting, request) = match planned {
        Ok(planned) => planned,
        Err(reply) => {
            reply_in_thread(&app, &event, reply, false).await;
            return;
        }
    };

    reply_in_thread(&app, &event, starting, true).await;

    if let Err(e) = app.dispatcher.dispatch(&request) {
        error!(issue_id = %request.task.issue_id, error = %e, "failed to dispatch agent task");
        reply_in_thread(&app, &event, DISPATCH_FAILED_REPLY.to_string(), false).await;
    }
}

/// Post `text` in the mention's thread. With `acknowledge`, also add an
/// :eyes: reaction to the triggering message.
async fn reply_in_thread(app: &AppState, event: &AppMention, text: String, acknowledge: bool) {
    let Some(settings) = app.slack.clone() else {
        warn!(channel = %event.channel, "SLACK_BOT_TOKEN not set; dropping thread reply");
        return;
    };
    let channel = event.channel.clone();
    let ts = event.ts.clone();
    let thread_ts = event.reply_ts().to_string();

    let result = tokio::task::spawn_blocking(move || {
        let client = settings.client()?;
        if acknowledge {
            if let Err(e) = client.add_reaction(&channel, &ts, "eyes") {
                warn!(error = %e, "failed to add reaction");
            }
        }
        client.post_message(&channel, &text, Some(&thread_ts))
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "failed to reply in slack thread"),
        Err(e) => error!(error = %e, "slack reply task join error"),
    }
}
