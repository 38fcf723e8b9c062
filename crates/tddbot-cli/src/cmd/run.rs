use anyhow::Context;
use claude_client::{ClaudeClient, ClaudeConfig};
use clap::Args;
use std::path::PathBuf;
use tddbot_core::git::GitRepo;
use tddbot_core::linear::LinearClient;
use tddbot_core::prompt::{GenerationRequest, Generator};
use tddbot_core::report::{failure_summary, ProgressReporter, ReportDestination, RoutingSink, RunHeader};
use tddbot_core::slack::SlackClient;
use tddbot_core::task::WorkflowTask;
use tddbot_core::test_runner::ShellTestRunner;
use tddbot_core::workflow::{Workflow, WorkflowOutcome};
use tddbot_core::TddError;

// ---------------------------------------------------------------------------
// RunFailure: why a run failed, surfaced to main as an error (exit 1)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunFailure {
    TestsFailed { issue_id: String },
    WorkflowFailed { issue_id: String, reason: String },
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunFailure::TestsFailed { issue_id } => {
                write!(f, "tests failed for {issue_id}; changes were not committed")
            }
            RunFailure::WorkflowFailed { issue_id, reason } => {
                write!(f, "workflow for {issue_id} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for RunFailure {}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RunArgs {
    /// Linear issue identifier, e.g. ABC-123
    #[arg(long)]
    pub issue_id: String,

    /// Local checkout to work in
    #[arg(long)]
    pub project_path: PathBuf,

    /// Agent persona (developer, tester, architect, ...)
    #[arg(long)]
    pub agent_role: String,

    #[arg(long)]
    pub task_description: String,

    /// Shell command that runs the project's tests
    #[arg(long)]
    pub test_command: Option<String>,

    #[arg(long)]
    pub project_name: Option<String>,

    /// Report into this Slack channel instead of the Linear issue
    #[arg(long, requires = "slack_thread_ts")]
    pub slack_channel: Option<String>,

    #[arg(long, requires = "slack_channel")]
    pub slack_thread_ts: Option<String>,

    #[command(flatten)]
    pub claude: ClaudeArgs,

    #[arg(long, env = "LINEAR_API_KEY", hide_env_values = true)]
    pub linear_api_key: Option<String>,

    #[arg(long, env = "LINEAR_API_URL")]
    pub linear_api_url: Option<String>,

    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: Option<String>,

    #[arg(long, env = "SLACK_API_URL")]
    pub slack_api_url: Option<String>,
}

#[derive(Args)]
pub struct ClaudeArgs {
    #[arg(long = "anthropic-api-key", env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "claude-model", env = "CLAUDE_MODEL", default_value = claude_client::client::DEFAULT_MODEL)]
    pub model: String,

    #[arg(long = "claude-max-tokens", env = "CLAUDE_MAX_TOKENS", default_value_t = claude_client::client::DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    #[arg(long = "claude-temperature", env = "CLAUDE_TEMPERATURE", default_value_t = claude_client::client::DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long = "anthropic-api-url", env = "ANTHROPIC_API_URL")]
    pub api_url: Option<String>,
}

impl ClaudeArgs {
    fn client(&self) -> anyhow::Result<ClaudeClient> {
        let mut config = ClaudeConfig::new(self.api_key.clone().unwrap_or_default());
        config.model = self.model.clone();
        config.max_tokens = self.max_tokens;
        config.temperature = self.temperature;
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        ClaudeClient::new(config).context("ANTHROPIC_API_KEY is required to generate code")
    }
}

// ---------------------------------------------------------------------------
// Generator backed by the Messages API
// ---------------------------------------------------------------------------

struct ClaudeGenerator(ClaudeClient);

impl Generator for ClaudeGenerator {
    fn generate(&self, request: &GenerationRequest) -> tddbot_core::Result<Option<String>> {
        self.0
            .generate_text(&request.system_prompt(), &request.user_prompt())
            .map_err(|e| TddError::Api(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut task = WorkflowTask::new(
        args.issue_id.clone(),
        args.project_path.clone(),
        args.agent_role.clone(),
        args.task_description.clone(),
    );
    task.test_command = args.test_command.clone().filter(|c| !c.trim().is_empty());
    task.project_name = args.project_name.clone();

    let destination = match (&args.slack_channel, &args.slack_thread_ts) {
        (Some(channel), Some(thread_ts)) => ReportDestination::ChatThread {
            channel: channel.clone(),
            thread_ts: thread_ts.clone(),
        },
        _ => ReportDestination::IssueComment {
            issue_id: task.issue_id.clone(),
        },
    };
    let chat = matches!(destination, ReportDestination::ChatThread { .. });

    let sink = RoutingSink {
        linear: args
            .linear_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .map(|key| LinearClient::new(key, args.linear_api_url.clone()))
            .transpose()?,
        slack: args
            .slack_bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .map(|token| SlackClient::new(token, args.slack_api_url.clone()))
            .transpose()?,
    };
    let reporter = ProgressReporter::new(&sink, destination);

    tracing::info!(
        issue_id = %task.issue_id,
        role = %task.agent_role,
        repo = %task.repo_path.display(),
        project = task.project_name.as_deref().unwrap_or("-"),
        "starting agent run"
    );

    // Setup failures still get a single report so the requester hears back.
    let setup = args.claude.client().and_then(|client| {
        let repo = GitRepo::open(&task.repo_path)
            .with_context(|| format!("cannot use repository at {}", task.repo_path.display()))?;
        Ok((ClaudeGenerator(client), repo))
    });
    let (generator, repo) = match setup {
        Ok(pair) => pair,
        Err(e) => {
            let branch = task.branch_name();
            let header = RunHeader::now(&task.agent_role, &branch);
            reporter.post(&failure_summary(&header, &format!("{e:#}")));
            return Err(RunFailure::WorkflowFailed {
                issue_id: task.issue_id,
                reason: format!("{e:#}"),
            }
            .into());
        }
    };

    let tests = ShellTestRunner::default();
    let issue_id = task.issue_id.clone();
    let outcome = Workflow::new(task, &repo, &generator, &tests, reporter)
        .with_milestones(chat)
        .run();

    match outcome {
        WorkflowOutcome::Success { files, .. } => {
            tracing::info!(%issue_id, files = files.len(), "agent run completed");
            Ok(())
        }
        WorkflowOutcome::TestsFailed { .. } => Err(RunFailure::TestsFailed { issue_id }.into()),
        WorkflowOutcome::Failed(failure) => Err(RunFailure::WorkflowFailed {
            issue_id,
            reason: failure.to_string(),
        }
        .into()),
    }
}
