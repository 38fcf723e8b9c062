use thiserror::Error;

#[derive(Debug, Error)]
pub enum TddError {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate project id in configuration: {0}")]
    DuplicateProject(String),

    #[error("invalid file path '{0}': must be relative and stay inside the repository")]
    InvalidPath(String),

    #[error("git {command} failed: {detail}")]
    Git { command: String, detail: String },

    #[error("git executable not found on PATH")]
    GitNotInstalled,

    #[error("api error: {0}")]
    Api(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, TddError>;
