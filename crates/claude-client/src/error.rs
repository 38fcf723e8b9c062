use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {kind}: {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Failed to parse API response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
}
