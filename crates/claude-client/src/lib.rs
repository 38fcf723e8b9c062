//! A small blocking client for the Claude Messages API.
//!
//! ```text
//! ClaudeConfig ──► ClaudeClient::complete(system, user)
//!                      │  POST {api_url}/v1/messages
//!                      ▼
//!                  MessagesResponse ──► first_text()
//! ```
//!
//! Everything is synchronous: the caller is a one-shot agent process that
//! has nothing else to do while it waits.

pub mod client;
pub mod error;
pub mod types;


pub use client::{ClaudeClient, ClaudeConfig};
pub use error::ClaudeError;
pub use types::{ContentBlock, InputMessage, MessagesRequest, MessagesResponse, Role, TokenUsage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeError>;
