use crate::error::{Result, TddError};
use crate::linear::LinearClient;
use crate::slack::SlackClient;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const SUCCESS_OUTPUT_LIMIT: usize = 1000;
pub const FAILURE_OUTPUT_LIMIT: usize = 2000;

const FOOTER: &str = "*Generated by tddbot*";

// ---------------------------------------------------------------------------
// Destination / kind
// ---------------------------------------------------------------------------

/// Where a run's reports go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportDestination {
    IssueComment { issue_id: String },
    ChatThread { channel: String, thread_ts: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Started,
    Testing,
    Committing,
    Success,
    Failed,
    Other,
}

impl ProgressKind {
    pub fn marker(&self) -> &'static str {
        match self {
            ProgressKind::Started => "🔄",
            ProgressKind::Testing => "🧪",
            ProgressKind::Committing => "💾",
            ProgressKind::Success => "✅",
            ProgressKind::Failed => "❌",
            ProgressKind::Other => "📝",
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

pub trait ReportSink {
    fn post(&self, destination: &ReportDestination, body: &str) -> Result<()>;
}

/// Sends issue comments to Linear and thread replies to Slack. A missing
/// client makes posts to that destination fail.
#[derive(Default)]
pub struct RoutingSink {
    pub linear: Option<LinearClient>,
    pub slack: Option<SlackClient>,
}

impl ReportSink for RoutingSink {
    fn post(&self, destination: &ReportDestination, body: &str) -> Result<()> {
        match destination {
            ReportDestination::IssueComment { issue_id } => match &self.linear {
                Some(linear) => linear.add_comment(issue_id, body),
                None => Err(TddError::Api("LINEAR_API_KEY is not configured".into())),
            },
            ReportDestination::ChatThread { channel, thread_ts } => match &self.slack {
                Some(slack) => slack.post_message(channel, body, Some(thread_ts)),
                None => Err(TddError::Api("SLACK_BOT_TOKEN is not configured".into())),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressReporter
// ---------------------------------------------------------------------------

/// Posts progress notes and final summaries for one run. Post failures are
/// logged and swallowed.
pub struct ProgressReporter<'a> {
    sink: &'a dyn ReportSink,
    destination: ReportDestination,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ReportSink, destination: ReportDestination) -> Self {
        Self { sink, destination }
    }

    pub fn report(&self, kind: ProgressKind, message: &str) {
        self.post(&format!("{} {message}", kind.marker()));
    }

    pub fn post(&self, body: &str) {
        match self.sink.post(&self.destination, body) {
            Ok(()) => info!(destination = ?self.destination, "report posted"),
            Err(e) => error!(destination = ?self.destination, error = %e, "failed to post report"),
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Identifies the run in every summary.
#[derive(Debug, Clone)]
pub struct RunHeader<'a> {
    pub role: &'a str,
    pub branch: &'a str,
    pub timestamp: String,
}

impl<'a> RunHeader<'a> {
    pub fn now(role: &'a str, branch: &'a str) -> Self {
        Self {
            role,
            branch,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    fn render(&self) -> String {
        format!(
            "**Agent:** {}\n**Branch:** `{}`\n**Timestamp:** {}",
            self.role, self.branch, self.timestamp
        )
    }
}

pub fn success_summary(header: &RunHeader<'_>, files: &[String], test_output: &str) -> String {
    let file_list = files
        .iter()
        .map(|f| format!("- `{f}`"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "## ✅ Task Completed Successfully\n\n{}\n\n### Modified Files\n{file_list}\n\n\
### Test Results\n```\n{}\n```\n\n\
The changes passed their tests and were pushed to the feature branch.\n\n{FOOTER}",
        header.render(),
        truncate(test_output, SUCCESS_OUTPUT_LIMIT),
    )
}

pub fn test_failure_summary(header: &RunHeader<'_>, test_output: &str) -> String {
    format!(
        "## ❌ Tests Failed\n\n{}\n\n### Test Output\n```\n{}\n```\n\n\
The generated changes were **not** committed. Review the output above and \
mention the agent again with more guidance.\n\n{FOOTER}",
        header.render(),
        truncate(test_output, FAILURE_OUTPUT_LIMIT),
    )
}

pub fn failure_summary(header: &RunHeader<'_>, message: &str) -> String {
    format!(
        "## 🚨 Agent Workflow Failed\n\n{}\n\n### Error\n```\n{message}\n```\n\n\
The run stopped before completing the task.\n\n{FOOTER}",
        header.render(),
    )
}

/// First `limit` characters of `s`, with `...` appended when anything was cut.
pub fn truncate(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
