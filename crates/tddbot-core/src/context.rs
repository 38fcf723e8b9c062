//! Bounded repository snapshot handed to the generator as context.

use indexmap::IndexMap;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

pub const MAX_CONTEXT_FILES: usize = 20;
pub const MAX_FILE_CHARS: usize = 10_000;

/// Relative path to file contents, in collection order.
pub type ContextFiles = IndexMap<String, String>;

/// Globs visited in priority order. `*` never crosses a `/`; a pattern
/// matches when it matches a trailing run of path segments.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "*.py",
    "*.rs",
    "*.ts",
    "*.js",
    "*.go",
    "requirements*.txt",
    "pyproject.toml",
    "Cargo.toml",
    "package.json",
    "go.mod",
    "README.md",
    "tests/*",
];

const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "venv"];

#[derive(Debug, Clone)]
pub struct ContextGatherer {
    patterns: Vec<String>,
    max_files: usize,
    max_chars: usize,
}

impl Default for ContextGatherer {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            max_files: MAX_CONTEXT_FILES,
            max_chars: MAX_FILE_CHARS,
        }
    }
}

impl ContextGatherer {
    pub fn with_patterns(patterns: Vec<String>) -> Self {
        Self {
            patterns,
            ..Self::default()
        }
    }

    /// Collect context files under `root`. Never fails; problems are logged
    /// and the offending file is skipped.
    pub fn gather(&self, root: &Path) -> ContextFiles {
        let mut files = ContextFiles::new();
        let candidates = list_files(root);

        'patterns: for pattern in &self.patterns {
            let Some(re) = glob_to_regex(pattern) else {
                warn!(pattern, "skipping unparseable context pattern");
                continue;
            };
            for rel in candidates.iter().filter(|rel| re.is_match(rel)) {
                if files.len() >= self.max_files {
                    break 'patterns;
                }
                if files.contains_key(rel) {
                    continue;
                }
                match std::fs::read_to_string(root.join(rel)) {
                    Ok(content) if !content.is_empty() && content.chars().count() < self.max_chars => {
                        files.insert(rel.clone(), content);
                    }
                    Ok(_) => debug!(path = %rel, "skipping empty or oversized file"),
                    Err(e) => debug!(path = %rel, error = %e, "skipping unreadable file"),
                }
            }
        }

        info!(count = files.len(), "gathered context files");
        files
    }
}

/// Every regular file below `root` as a `/`-separated relative path, in
/// file-name order, skipping VCS metadata, build output and hidden dirs.
fn list_files(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                debug!(error = %err, "walk error");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_str()).collect::<Option<_>>()?;
            Some(parts.join("/"))
        })
        .collect()
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("(?:^|/)");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}
