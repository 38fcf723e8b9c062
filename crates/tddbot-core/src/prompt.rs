use crate::context::ContextFiles;
use crate::error::Result;

/// Everything the generator needs for one request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub role: String,
    pub task_description: String,
    pub context_files: ContextFiles,
    pub test_results: Option<String>,
}

/// Produces a free-text response containing `### File:` blocks.
///
/// `Ok(None)` means the collaborator answered but returned no text.
pub trait Generator {
    fn generate(&self, request: &GenerationRequest) -> Result<Option<String>>;
}

impl GenerationRequest {
    pub fn system_prompt(&self) -> String {
        format!(
            r#"You are a {role} working on a software development task.
Write clean, maintainable, well-tested code.

You will receive a task description, the current contents of relevant files,
and test results when there are any.

Start with a short analysis, then give every file you create or change as a
complete file in its own block, exactly like this:

## Analysis
<your analysis>

## Implementation

### File: path/to/file.ext
```language
<full file contents>
```

Paths are relative to the repository root."#,
            role = self.role
        )
    }

    pub fn user_prompt(&self) -> String {
        let mut parts = vec![format!("**Task:** {}", self.task_description)];

        if !self.context_files.is_empty() {
            parts.push("\n**Current Files:**".to_string());
            for (path, content) in &self.context_files {
                parts.push(format!("\n### {path}\n```\n{content}\n```"));
            }
        }

        if let Some(results) = &self.test_results {
            parts.push(format!("\n**Test Results:**\n```\n{results}\n```"));
        }

        parts.join("\n")
    }
}
