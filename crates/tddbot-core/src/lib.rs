pub mod agent_type;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod git;
pub mod io;
pub mod issue_ref;
pub mod linear;
pub mod mention;
pub mod payload;
pub mod prompt;
pub mod report;
pub mod signature;
pub mod slack;
pub mod task;
pub mod test_runner;
pub mod workflow;

pub use error::{Result, TddError};
