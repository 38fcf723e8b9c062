use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// Sentinels carried through the anyhow chain
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct UnauthorizedError(String);

impl std::fmt::Display for UnauthorizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnauthorizedError {}

#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Error type for every handler. Rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(UnauthorizedError(msg.into()).into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(e) = self.0.downcast_ref::<UnauthorizedError>() {
            let body = serde_json::json!({ "error": e.0.clone() });
            return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
        }
        if let Some(e) = self.0.downcast_ref::<BadRequestError>() {
            let body = serde_json::json!({ "error": e.0.clone() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        tracing::error!(error = %self.0, "request failed");
        let body = serde_json::json!({ "error": self.0.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
