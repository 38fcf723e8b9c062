//! The agent run: branch, context, generate, write, test, commit, push, report.
//!
//! Every step either advances the run or ends it with a [`StepFailure`].
//! Exactly one final summary is posted per run, and nothing escapes
//! [`Workflow::run`] as an error; panics included.

use crate::context::ContextGatherer;
use crate::extract::extract;
use crate::git::{CommitOutcome, Vcs};
use crate::io::write_repo_file;
use crate::prompt::{GenerationRequest, Generator};
use crate::report::{
    failure_summary, success_summary, test_failure_summary, ProgressKind, ProgressReporter,
    RunHeader,
};
use crate::task::WorkflowTask;
use crate::test_runner::TestRunner;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info, warn};

pub const NO_TESTS_OUTPUT: &str = "No tests specified";

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    BranchReady,
    ContextGathered,
    Generated,
    FilesWritten,
    TestsRun,
    Committed,
    Pushed,
    Reported,
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    Checkout(String),
    Generation,
    NoCodeBlocks,
    NoFilesWritten,
    Commit(String),
    Push(String),
    Unexpected(String),
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::Checkout(d) => write!(f, "Failed to checkout branch: {d}"),
            StepFailure::Generation => f.write_str("Failed to generate code with Claude AI"),
            StepFailure::NoCodeBlocks => f.write_str("No code blocks found in Claude response"),
            StepFailure::NoFilesWritten => f.write_str("Failed to write any files"),
            StepFailure::Commit(d) => write!(f, "Failed to commit changes: {d}"),
            StepFailure::Push(d) => write!(f, "Failed to push changes to remote: {d}"),
            StepFailure::Unexpected(d) => write!(f, "Unexpected error: {d}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Success { files: Vec<String>, test_output: String },
    TestsFailed { files: Vec<String>, output: String },
    Failed(StepFailure),
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

pub struct Workflow<'a> {
    task: WorkflowTask,
    vcs: &'a dyn Vcs,
    generator: &'a dyn Generator,
    tests: &'a dyn TestRunner,
    reporter: ProgressReporter<'a>,
    context: ContextGatherer,
    milestones: bool,
}

impl<'a> Workflow<'a> {
    pub fn new(
        task: WorkflowTask,
        vcs: &'a dyn Vcs,
        generator: &'a dyn Generator,
        tests: &'a dyn TestRunner,
        reporter: ProgressReporter<'a>,
    ) -> Self {
        Self {
            task,
            vcs,
            generator,
            tests,
            reporter,
            context: ContextGatherer::default(),
            milestones: false,
        }
    }

    /// Also post started/testing/committing notes, not just the final summary.
    pub fn with_milestones(mut self, enabled: bool) -> Self {
        self.milestones = enabled;
        self
    }

    /// Execute the run and post its final summary.
    pub fn run(&self) -> WorkflowOutcome {
        info!(
            issue_id = %self.task.issue_id,
            role = %self.task.agent_role,
            project = self.task.project_name.as_deref().unwrap_or("-"),
            "starting agent workflow"
        );

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.execute())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(error = %msg, "unexpected error in workflow");
                WorkflowOutcome::Failed(StepFailure::Unexpected(msg))
            }
        };

        self.report_final(&outcome);
        self.transition(WorkflowState::Reported);
        outcome
    }

    fn execute(&self) -> WorkflowOutcome {
        let task = &self.task;
        let branch = task.branch_name();
        self.transition(WorkflowState::Start);
        self.milestone(
            ProgressKind::Started,
            &format!(
                "{} started on {} (branch `{branch}`)",
                task.agent_role, task.issue_id
            ),
        );

        if let Err(e) = self.vcs.checkout_branch(&branch) {
            error!(branch = %branch, error = %e, "failed to checkout branch");
            return WorkflowOutcome::Failed(StepFailure::Checkout(e.to_string()));
        }
        self.transition(WorkflowState::BranchReady);

        let context_files = self.context.gather(&task.repo_path);
        self.transition(WorkflowState::ContextGathered);

        let request = GenerationRequest {
            role: task.agent_role.clone(),
            task_description: task.task_description.clone(),
            context_files,
            test_results: None,
        };
        let response = match self.generator.generate(&request) {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                error!("empty response from generator");
                return WorkflowOutcome::Failed(StepFailure::Generation);
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                return WorkflowOutcome::Failed(StepFailure::Generation);
            }
        };
        self.transition(WorkflowState::Generated);

        let blocks = extract(&response);
        if blocks.is_empty() {
            return WorkflowOutcome::Failed(StepFailure::NoCodeBlocks);
        }

        let mut written = Vec::new();
        for (path, content) in &blocks {
            match write_repo_file(&task.repo_path, path, content) {
                Ok(_) => {
                    info!(path = %path, "wrote file");
                    written.push(path.clone());
                }
                Err(e) => warn!(path = %path, error = %e, "failed to write file"),
            }
        }
        if written.is_empty() {
            return WorkflowOutcome::Failed(StepFailure::NoFilesWritten);
        }
        self.transition(WorkflowState::FilesWritten);

        let test_output = match &task.test_command {
            Some(command) => {
                self.milestone(ProgressKind::Testing, &format!("Running tests: `{command}`"));
                let result = self.tests.run(command, &task.repo_path);
                self.transition(WorkflowState::TestsRun);
                if !result.passed {
                    return WorkflowOutcome::TestsFailed {
                        files: written,
                        output: result.output,
                    };
                }
                result.output
            }
            None => NO_TESTS_OUTPUT.to_string(),
        };

        self.milestone(
            ProgressKind::Committing,
            &format!("Committing {} file(s) to `{branch}`", written.len()),
        );
        match self.vcs.stage_and_commit(&task.commit_message(&written), &written) {
            Ok(CommitOutcome::Committed) => self.transition(WorkflowState::Committed),
            Ok(CommitOutcome::NothingToCommit) => info!("nothing new to commit"),
            Err(e) => return WorkflowOutcome::Failed(StepFailure::Commit(e.to_string())),
        }

        if let Err(e) = self.vcs.push(&branch) {
            return WorkflowOutcome::Failed(StepFailure::Push(e.to_string()));
        }
        self.transition(WorkflowState::Pushed);

        WorkflowOutcome::Success {
            files: written,
            test_output,
        }
    }

    fn report_final(&self, outcome: &WorkflowOutcome) {
        let branch = self.task.branch_name();
        let header = RunHeader::now(&self.task.agent_role, &branch);
        let body = match outcome {
            WorkflowOutcome::Success { files, test_output } => {
                info!(files = files.len(), "workflow succeeded");
                success_summary(&header, files, test_output)
            }
            WorkflowOutcome::TestsFailed { output, .. } => {
                warn!("tests failed; changes not committed");
                test_failure_summary(&header, output)
            }
            WorkflowOutcome::Failed(failure) => {
                error!(reason = %failure, "workflow failed");
                failure_summary(&header, &failure.to_string())
            }
        };
        self.reporter.post(&body);
    }

    fn milestone(&self, kind: ProgressKind, message: &str) {
        if self.milestones {
            self.reporter.report(kind, message);
        }
    }

    fn transition(&self, state: WorkflowState) {
        info!(issue_id = %self.task.issue_id, state = ?state, "workflow state");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
