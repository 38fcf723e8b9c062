pub mod dispatch;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use dispatch::{Dispatch, DispatchRequest, ProcessDispatcher};
pub use state::{AppState, SlackSettings};

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health))
        .route("/webhook/linear", post(routes::webhook::linear_webhook))
        .route("/slack/events", post(routes::slack::slack_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(listener, state).await
}

/// Serve on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding port 0.
pub async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let projects = state.store.projects().len();
    let app = build_router(state);

    tracing::info!(projects, "webhook dispatcher listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
