//! Turning a Slack `app_mention` into either a dispatch or a thread reply.

use crate::agent_type::{infer_agent_type, AgentType};
use crate::config::{AgentConfig, ProjectConfig, ProjectStore};
use crate::issue_ref::extract_reference;
use crate::report::ReportDestination;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

static USER_MENTION_RE: OnceLock<Regex> = OnceLock::new();
static KEYWORD_RE: OnceLock<Regex> = OnceLock::new();
static SPACES_RE: OnceLock<Regex> = OnceLock::new();

fn user_mention_re() -> &'static Regex {
    USER_MENTION_RE.get_or_init(|| Regex::new(r"<@([UW]\w+)>").unwrap())
}

fn keyword_re() -> &'static Regex {
    KEYWORD_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:developer|tester|architect|please|implement|test|design)\b").unwrap()
    })
}

fn spaces_re() -> &'static Regex {
    SPACES_RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

pub const MISSING_ISSUE_REPLY: &str = "📋 Please include a Linear issue URL in your message.\n\
Example: `@bot developer https://linear.app/team/issue/ABC-123`";

pub const MISSING_AGENT_TYPE_REPLY: &str = "🤖 Please specify an agent type: developer, tester, or architect.\n\
Example: `@bot developer implement feature X https://linear.app/team/issue/ABC-123`";

pub const DISPATCH_FAILED_REPLY: &str = "❌ Failed to start agent task. Check server logs for details.";

/// The subset of a Slack `app_mention` event we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppMention {
    #[serde(default)]
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

impl AppMention {
    /// Replies go into the existing thread, or start one under the message.
    pub fn reply_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    pub fn destination(&self) -> ReportDestination {
        ReportDestination::ChatThread {
            channel: self.channel.clone(),
            thread_ts: self.reply_ts().to_string(),
        }
    }

    /// Slack user ids mentioned in the text, in order.
    pub fn mentioned_users(&self) -> Vec<&str> {
        user_mention_re()
            .captures_iter(&self.text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }
}

/// A mention that resolved to a concrete agent.
#[derive(Debug, Clone)]
pub struct MentionPlan<'a> {
    pub project: &'a ProjectConfig,
    pub agent: &'a AgentConfig,
    pub agent_label: String,
    pub issue_id: String,
    pub task_description: String,
}

impl MentionPlan<'_> {
    pub fn starting_reply(&self) -> String {
        format!(
            "🚀 Starting {} agent for issue {}...\nTask: {}\nI'll update this thread with progress.",
            self.agent_label, self.issue_id, self.task_description
        )
    }
}

/// Resolve a mention against the configured projects.
///
/// `Err` carries the reply to post in the thread.
pub fn plan_mention<'a>(store: &'a ProjectStore, event: &AppMention) -> Result<MentionPlan<'a>, String> {
    let Some(issue) = extract_reference(&event.text) else {
        return Err(MISSING_ISSUE_REPLY.to_string());
    };
    let reference = issue.url.as_deref().unwrap_or(&issue.issue_id);
    let task_description = extract_task_description(&event.text, reference);

    let Some(project) = store.project_for_channel(&event.channel) else {
        return Err(format!(
            "❌ Could not find project configuration for issue {}",
            issue.issue_id
        ));
    };

    let by_bot = event
        .mentioned_users()
        .into_iter()
        .find_map(|id| project.find_agent_by_slack_bot(id));
    let (agent, agent_label) = match by_bot {
        Some(agent) => (agent, agent.mention.trim_start_matches('@').to_string()),
        None => {
            let Some(agent_type) = infer_agent_type(&event.text) else {
                return Err(MISSING_AGENT_TYPE_REPLY.to_string());
            };
            let Some(agent) = project.find_agent_by_type(agent_type) else {
                return Err(no_agent_reply(agent_type));
            };
            (agent, agent_type.to_string())
        }
    };

    Ok(MentionPlan {
        project,
        agent,
        agent_label,
        issue_id: issue.issue_id,
        task_description,
    })
}

fn no_agent_reply(agent_type: AgentType) -> String {
    format!("❌ No {agent_type} agent configured for this project")
}

/// Strip bot mentions, the issue reference and persona keywords from a
/// mention, leaving the request itself.
pub fn extract_task_description(text: &str, issue_reference: &str) -> String {
    let mut out = user_mention_re().replace_all(text, "").into_owned();
    if !issue_reference.is_empty() {
        out = out.replace(issue_reference, "");
        if let Some(bare) = issue_reference.strip_prefix("https://") {
            out = out.replace(bare, "");
        }
    }
    out = out.replace("<>", "");
    let out = keyword_re().replace_all(&out, "");
    spaces_re().replace_all(out.trim(), " ").into_owned()
}
