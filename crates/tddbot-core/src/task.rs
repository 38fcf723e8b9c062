use crate::config::{AgentConfig, ProjectConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const BRANCH_PREFIX: &str = "feature/";

/// One unit of agent work: an issue, a repository, a persona and a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub issue_id: String,
    pub repo_path: PathBuf,
    pub agent_role: String,
    pub task_description: String,
    pub test_command: Option<String>,
    pub project_name: Option<String>,
}

impl WorkflowTask {
    pub fn new(
        issue_id: impl Into<String>,
        repo_path: impl Into<PathBuf>,
        agent_role: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            repo_path: repo_path.into(),
            agent_role: agent_role.into(),
            task_description: task_description.into(),
            test_command: None,
            project_name: None,
        }
    }

    /// Build the task a project agent should run for `issue_id`.
    pub fn for_agent(
        project: &ProjectConfig,
        agent: &AgentConfig,
        issue_id: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            test_command: agent.test_command.clone().filter(|c| !c.trim().is_empty()),
            project_name: Some(project.project_name.clone()),
            ..Self::new(issue_id, project.repo_path.clone(), agent.role.clone(), task_description)
        }
    }

    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = Some(command.into());
        self
    }

    pub fn branch_name(&self) -> String {
        format!("{BRANCH_PREFIX}{}", self.issue_id)
    }

    pub fn commit_message(&self, files: &[String]) -> String {
        format!(
            "feat({}): {}\n\nFiles modified: {}",
            self.issue_id,
            self.task_description,
            files.join(", ")
        )
    }
}
