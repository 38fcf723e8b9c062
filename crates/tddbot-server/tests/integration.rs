use axum::http::StatusCode;
use http_body_util::BodyExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tddbot_core::config::ProjectStore;
use tddbot_server::{build_router, AppState, Dispatch, DispatchRequest, SlackSettings};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records every request instead of spawning a process.
#[derive(Default, Clone)]
struct RecordingDispatcher {
    requests: Arc<Mutex<Vec<DispatchRequest>>>,
}

impl RecordingDispatcher {
    fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Dispatch for RecordingDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> anyhow::Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct FailingDispatcher;

impl Dispatch for FailingDispatcher {
    fn dispatch(&self, _request: &DispatchRequest) -> anyhow::Result<()> {
        anyhow::bail!("no such binary")
    }
}

fn store() -> ProjectStore {
    ProjectStore::from_json(
        r#"[
          {
            "linearProjectId": "proj-1",
            "projectName": "Web",
            "repoPath": "/srv/web",
            "slackChannelId": "C1",
            "agents": [
              {"mention": "@developer", "role": "developer", "testCommand": "pytest -q", "slackBotId": "UDEV"},
              {"mention": "@tester", "role": "tester"}
            ]
          }
        ]"#,
    )
    .unwrap()
}

fn app_with(dispatcher: Arc<dyn Dispatch>) -> AppState {
    AppState::new(store(), dispatcher)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// POST raw bytes with extra headers and return (status, parsed JSON body).
async fn post_raw(
    app: axum::Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> (StatusCode, serde_json::Value) {
    let mut req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let req = req.body(axum::body::Body::from(body)).unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn comment_payload(body: &str, project_id: Option<&str>) -> serde_json::Value {
    let mut issue = serde_json::json!({ "id": "ABC-123" });
    if let Some(pid) = project_id {
        issue["project"] = serde_json::json!({ "id": pid });
    }
    serde_json::json!({
        "action": "create",
        "type": "Comment",
        "createdAt": "2024-01-01T00:00:00Z",
        "organizationId": "org-1",
        "webhookId": "wh-1",
        "data": {
            "id": "comment-1",
            "body": body,
            "issue": issue,
            "user": { "id": "user-1", "name": "Ada" }
        }
    })
}

async fn post_webhook(state: AppState, payload: serde_json::Value) -> (StatusCode, serde_json::Value) {
    post_raw(
        build_router(state),
        "/webhook/linear",
        &[],
        serde_json::to_vec(&payload).unwrap(),
    )
    .await
}

async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_healthy() {
    let app = build_router(app_with(Arc::new(RecordingDispatcher::default())));
    let (status, json) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "webhook_dispatcher");
}

#[tokio::test]
async fn root_lists_endpoints() {
    let app = build_router(app_with(Arc::new(RecordingDispatcher::default())));
    let (status, json) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");
    assert!(json["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "/webhook/linear"));
}

// ---------------------------------------------------------------------------
// Linear webhook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatches_one_task_per_mention() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone()));
    let (status, json) = post_webhook(
        state,
        comment_payload("@developer add login, then @tester cover it", Some("proj-1")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["dispatched"], true);
    assert_eq!(json["message"], "Successfully dispatched 2 agent task(s)");

    let requests = recorder.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].task.agent_role, "developer");
    assert_eq!(requests[0].task.issue_id, "ABC-123");
    assert_eq!(requests[0].task.test_command.as_deref(), Some("pytest -q"));
    assert_eq!(requests[0].task.project_name.as_deref(), Some("Web"));
    assert!(requests[0].chat_thread.is_none());
    assert_eq!(requests[1].task.agent_role, "tester");
    assert_eq!(requests[1].task.test_command, None);
}

#[tokio::test]
async fn comment_without_mentions_dispatches_nothing() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone()));
    let (status, json) = post_webhook(
        state,
        comment_payload("see https://linear.app/team/issue/ABC-123", Some("proj-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "No agent mentions found in comment");
    assert_eq!(json["dispatched"], false);
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn mentions_are_checked_before_project() {
    let state = app_with(Arc::new(RecordingDispatcher::default()));
    let (_, json) = post_webhook(state, comment_payload("no handles here", None)).await;
    assert_eq!(json["message"], "No agent mentions found in comment");
}

#[tokio::test]
async fn missing_project_id_is_reported() {
    let state = app_with(Arc::new(RecordingDispatcher::default()));
    let (status, json) = post_webhook(state, comment_payload("@developer go", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "No project ID found in webhook");
}

#[tokio::test]
async fn unknown_project_is_reported() {
    let state = app_with(Arc::new(RecordingDispatcher::default()));
    let (_, json) = post_webhook(state, comment_payload("@developer go", Some("nope"))).await;
    assert_eq!(json["message"], "Unknown project ID: nope");
    assert_eq!(json["dispatched"], false);
}

#[tokio::test]
async fn unknown_handles_dispatch_nothing() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone()));
    let (_, json) = post_webhook(state, comment_payload("@someone look", Some("proj-1"))).await;
    assert_eq!(json["message"], "No valid agent mentions found for this project");
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn failed_dispatch_is_not_counted() {
    let state = app_with(Arc::new(FailingDispatcher));
    let (status, json) = post_webhook(state, comment_payload("@developer go", Some("proj-1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dispatched"], false);
    assert_eq!(json["message"], "No valid agent mentions found for this project");
}

#[tokio::test]
async fn non_comment_event_is_acknowledged() {
    let state = app_with(Arc::new(RecordingDispatcher::default()));
    let mut payload = comment_payload("@developer go", Some("proj-1"));
    payload["type"] = "Issue".into();
    let (status, json) = post_webhook(state, payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Webhook received but not a comment event");
}

#[tokio::test]
async fn invalid_json_is_400() {
    let app = build_router(app_with(Arc::new(RecordingDispatcher::default())));
    let (status, json) = post_raw(app, "/webhook/linear", &[], b"{not json".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid JSON payload");
}

#[tokio::test]
async fn missing_envelope_field_is_400() {
    let app = build_router(app_with(Arc::new(RecordingDispatcher::default())));
    let mut payload = comment_payload("@developer go", Some("proj-1"));
    payload.as_object_mut().unwrap().remove("webhookId");
    let (status, json) = post_raw(app, "/webhook/linear", &[], serde_json::to_vec(&payload).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid webhook payload structure");
}

#[tokio::test]
async fn bad_signature_is_401() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone())).with_linear_secret(Some("s3cret".into()));
    let body = serde_json::to_vec(&comment_payload("@developer go", Some("proj-1"))).unwrap();
    let (status, json) = post_raw(
        build_router(state),
        "/webhook/linear",
        &[("Linear-Signature", "deadbeef")],
        body,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid webhook signature");
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone())).with_linear_secret(Some("s3cret".into()));
    let body = serde_json::to_vec(&comment_payload("@developer go", Some("proj-1"))).unwrap();
    let sig = tddbot_core::signature::sign(b"s3cret", &body);
    let (status, json) = post_raw(
        build_router(state),
        "/webhook/linear",
        &[("Linear-Signature", sig.as_str())],
        body,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dispatched"], true);
    assert_eq!(recorder.requests().len(), 1);
}

// ---------------------------------------------------------------------------
// Slack events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let app = build_router(app_with(Arc::new(RecordingDispatcher::default())));
    let body = serde_json::json!({ "type": "url_verification", "challenge": "abc123" });
    let (status, json) = post_raw(app, "/slack/events", &[], serde_json::to_vec(&body).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["challenge"], "abc123");
}

#[tokio::test]
async fn slack_signature_is_enforced_when_configured() {
    let state = app_with(Arc::new(RecordingDispatcher::default())).with_slack_signing_secret(Some("sig".into()));
    let body = serde_json::json!({ "type": "url_verification", "challenge": "abc" });
    let (status, _) = post_raw(
        build_router(state),
        "/slack/events",
        &[("X-Slack-Request-Timestamp", "1"), ("X-Slack-Signature", "v0=00")],
        serde_json::to_vec(&body).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn slack_signature_accepts_fresh_request() {
    let state = app_with(Arc::new(RecordingDispatcher::default())).with_slack_signing_secret(Some("sig".into()));
    let body = serde_json::to_vec(&serde_json::json!({ "type": "url_verification", "challenge": "ok" })).unwrap();
    let ts = chrono::Utc::now().timestamp().to_string();
    let mut base = format!("v0:{ts}:").into_bytes();
    base.extend_from_slice(&body);
    let sig = format!("v0={}", tddbot_core::signature::sign(b"sig", &base));
    let (status, json) = post_raw(
        build_router(state),
        "/slack/events",
        &[("X-Slack-Request-Timestamp", ts.as_str()), ("X-Slack-Signature", sig.as_str())],
        body,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["challenge"], "ok");
}

fn mention_event(text: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "event_callback",
        "event": {
            "type": "app_mention",
            "text": text,
            "channel": "C1",
            "ts": "171.000",
            "user": "UHUMAN"
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn retries_are_acknowledged_without_dispatch() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone()));
    let (status, json) = post_raw(
        build_router(state),
        "/slack/events",
        &[("X-Slack-Retry-Num", "1")],
        mention_event("<@UDEV> add login https://linear.app/team/issue/ABC-123"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn app_mention_dispatches_with_chat_thread() {
    let mut slack = mockito::Server::new_async().await;
    let reply = slack
        .mock("POST", "/chat.postMessage")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "channel": "C1",
            "thread_ts": "171.000"
        })))
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;
    slack
        .mock("POST", "/reactions.add")
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone())).with_slack(Some(SlackSettings {
        token: "xoxb-test".into(),
        api_url: Some(slack.url()),
    }));
    let (status, json) = post_raw(
        build_router(state),
        "/slack/events",
        &[],
        mention_event("<@UDEV> add login https://linear.app/team/issue/ABC-123"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);

    let r = recorder.clone();
    assert!(wait_for(move || !r.requests().is_empty()).await);
    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].task.issue_id, "ABC-123");
    assert_eq!(requests[0].task.agent_role, "developer");
    assert_eq!(requests[0].task.task_description, "add login");
    assert_eq!(
        requests[0].chat_thread,
        Some(("C1".to_string(), "171.000".to_string()))
    );
    assert!(reply.matched_async().await);
}

#[tokio::test]
async fn app_mention_without_issue_does_not_dispatch() {
    let recorder = RecordingDispatcher::default();
    let state = app_with(Arc::new(recorder.clone()));
    let (status, _) = post_raw(
        build_router(state),
        "/slack/events",
        &[],
        mention_event("<@UDEV> developer add login"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn other_events_are_acknowledged() {
    let app = build_router(app_with(Arc::new(RecordingDispatcher::default())));
    let body = serde_json::json!({ "type": "event_callback", "event": { "type": "message", "text": "hi" } });
    let (status, json) = post_raw(app, "/slack/events", &[], serde_json::to_vec(&body).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
}
