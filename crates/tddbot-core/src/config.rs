use crate::agent_type::AgentType;
use crate::error::{Result, TddError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Handle including the leading `@`, e.g. `@developer`.
    pub mention: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_bot_id: Option<String>,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub linear_project_id: String,
    pub project_name: String,
    pub repo_path: PathBuf,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_workspace_id: Option<String>,
}

impl ProjectConfig {
    pub fn find_agent_by_mention(&self, mention: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.mention == mention)
    }

    pub fn find_agent_by_type(&self, agent_type: AgentType) -> Option<&AgentConfig> {
        self.find_agent_by_mention(agent_type.mention())
    }

    pub fn find_agent_by_slack_bot(&self, bot_user_id: &str) -> Option<&AgentConfig> {
        self.agents
            .iter()
            .find(|a| a.slack_bot_id.as_deref() == Some(bot_user_id))
    }
}

// ---------------------------------------------------------------------------
// ProjectStore
// ---------------------------------------------------------------------------

/// Every configured project, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectStore {
    projects: Vec<ProjectConfig>,
}

impl ProjectStore {
    pub fn new(projects: Vec<ProjectConfig>) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &projects {
            if !seen.insert(p.linear_project_id.as_str()) {
                return Err(TddError::DuplicateProject(p.linear_project_id.clone()));
            }
        }
        Ok(Self { projects })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TddError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let projects: Vec<ProjectConfig> = serde_json::from_str(data)
            .map_err(|e| TddError::InvalidConfig(e.to_string()))?;
        Self::new(projects)
    }

    pub fn projects(&self) -> &[ProjectConfig] {
        &self.projects
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn find_project_by_id(&self, id: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.linear_project_id == id)
    }

    pub fn find_project_by_slack_channel(&self, channel: &str) -> Option<&ProjectConfig> {
        self.projects
            .iter()
            .find(|p| p.slack_channel_id.as_deref() == Some(channel))
    }

    /// Channel match, falling back to the first configured project.
    pub fn project_for_channel(&self, channel: &str) -> Option<&ProjectConfig> {
        self.find_project_by_slack_channel(channel)
            .or_else(|| self.projects.first())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.projects.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no projects configured".to_string(),
            });
        }

        for p in &self.projects {
            let id = &p.linear_project_id;
            if !p.repo_path.is_dir() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "project '{id}': repoPath {} is not a directory",
                        p.repo_path.display()
                    ),
                });
            }
            if p.agents.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("project '{id}' has no agents"),
                });
            }

            let mut handles = HashSet::new();
            for a in &p.agents {
                if !a.mention.starts_with('@') {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "project '{id}': mention '{}' must start with '@'",
                            a.mention
                        ),
                    });
                }
                if !handles.insert(a.mention.as_str()) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "project '{id}': mention '{}' is listed more than once; only the first is used",
                            a.mention
                        ),
                    });
                }
                if a.test_command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "project '{id}': agent '{}' has an empty testCommand",
                            a.mention
                        ),
                    });
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
