//! Launching one `tddbot run` process per agent task.
//!
//! Dispatch is fire-and-forget: the child is reaped in a background task that
//! only logs its exit status. Nothing about the run flows back to the caller.

use std::path::PathBuf;
use std::process::Stdio;
use tddbot_core::task::WorkflowTask;
use tokio::process::Command;
use uuid::Uuid;

/// Everything the agent engine needs on its command line.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub id: Uuid,
    pub task: WorkflowTask,
    /// `(channel, thread_ts)` when progress should go to a chat thread
    /// instead of the issue.
    pub chat_thread: Option<(String, String)>,
    pub verbose: bool,
}

impl DispatchRequest {
    pub fn new(task: WorkflowTask) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            chat_thread: None,
            verbose: false,
        }
    }

    pub fn with_chat_thread(mut self, channel: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        self.chat_thread = Some((channel.into(), thread_ts.into()));
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Arguments for the `run` subcommand, in order.
    ///
    /// Values are attached with `=` so free text starting with `-` (a
    /// Markdown list item, say) is never read as a flag.
    pub fn to_args(&self) -> Vec<String> {
        let task = &self.task;
        let mut args = vec![
            "run".to_string(),
            flag("issue-id", &task.issue_id),
            flag("project-path", &task.repo_path.display().to_string()),
            flag("agent-role", &task.agent_role),
            flag("task-description", &task.task_description),
        ];
        if let Some(cmd) = &task.test_command {
            args.push(flag("test-command", cmd));
        }
        if let Some(name) = &task.project_name {
            args.push(flag("project-name", name));
        }
        if let Some((channel, thread_ts)) = &self.chat_thread {
            args.push(flag("slack-channel", channel));
            args.push(flag("slack-thread-ts", thread_ts));
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        args
    }
}

fn flag(name: &str, value: &str) -> String {
    format!("--{name}={value}")
}

/// Starts an agent task somewhere else. `Ok` means it was started, not
/// that it finished.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, request: &DispatchRequest) -> anyhow::Result<()>;
}

/// Spawns the agent engine as a child process.
#[derive(Debug, Clone)]
pub struct ProcessDispatcher {
    program: PathBuf,
    verbose: bool,
}

impl ProcessDispatcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            verbose: false,
        }
    }

    /// Re-invoke the running binary.
    pub fn current_exe() -> anyhow::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl Dispatch for ProcessDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> anyhow::Result<()> {
        let args = request.clone().with_verbose(request.verbose || self.verbose).to_args();
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to spawn '{}': {e}", self.program.display()))?;

        let id = request.id;
        let issue_id = request.task.issue_id.clone();
        let role = request.task.agent_role.clone();
        tracing::info!(%id, %issue_id, %role, pid = ?child.id(), "agent task dispatched");

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!(%id, %issue_id, "agent task exited cleanly");
                }
                Ok(status) => {
                    tracing::warn!(%id, %issue_id, code = ?status.code(), "agent task exited with failure");
                }
                Err(e) => tracing::error!(%id, %issue_id, error = %e, "failed to wait on agent task"),
            }
        });
        Ok(())
    }
}
