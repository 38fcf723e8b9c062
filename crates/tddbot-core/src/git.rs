use crate::error::{Result, TddError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    NothingToCommit,
}

/// Version-control operations the workflow relies on.
pub trait Vcs {
    fn checkout_branch(&self, branch: &str) -> Result<()>;
    fn stage_and_commit(&self, message: &str, files: &[String]) -> Result<CommitOutcome>;
    fn push(&self, branch: &str) -> Result<()>;
}

/// A working tree driven through the `git` executable. The remote is always
/// `origin`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn open(root: &Path) -> Result<Self> {
        which::which("git").map_err(|_| TddError::GitNotInstalled)?;
        let repo = Self {
            root: root.to_path_buf(),
        };
        repo.git(&["rev-parse", "--git-dir"]).map_err(|_| TddError::Git {
            command: "rev-parse".to_string(),
            detail: format!("not a git repository: {}", root.display()),
        })?;
        Ok(repo)
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn has_local_branch(&self, branch: &str) -> bool {
        self.succeeds(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
    }

    pub fn has_remote_branch(&self, branch: &str) -> bool {
        self.succeeds(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/origin/{branch}"),
        ])
    }

    /// `main` when the remote has it, otherwise `master`.
    pub fn main_branch(&self) -> &'static str {
        if self.has_remote_branch("main") {
            "main"
        } else {
            "master"
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        debug!(args = ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(TddError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                detail: if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                },
            })
        }
    }

    fn succeeds(&self, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Vcs for GitRepo {
    fn checkout_branch(&self, branch: &str) -> Result<()> {
        self.git(&["fetch", "origin"])?;

        if self.has_local_branch(branch) {
            self.git(&["checkout", branch])?;
            if self.has_remote_branch(branch) {
                self.git(&["pull", "origin", branch])?;
            }
            info!(branch, "checked out existing local branch");
        } else if self.has_remote_branch(branch) {
            self.git(&["checkout", "-b", branch, &format!("origin/{branch}")])?;
            info!(branch, "checked out existing remote branch");
        } else {
            let base = self.main_branch();
            self.git(&["checkout", base])?;
            self.git(&["pull", "origin", base])?;
            self.git(&["checkout", "-b", branch])?;
            info!(branch, base, "created new branch");
        }
        Ok(())
    }

    fn stage_and_commit(&self, message: &str, files: &[String]) -> Result<CommitOutcome> {
        if files.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }
        let mut add = vec!["add", "--"];
        add.extend(files.iter().map(String::as_str));
        self.git(&add)?;

        if self.succeeds(&["diff", "--cached", "--quiet"]) {
            info!("no changes to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }
        self.git(&["commit", "-m", message])?;
        info!(files = files.len(), "created commit");
        Ok(CommitOutcome::Committed)
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.git(&["push", "origin", branch])?;
        info!(branch, "pushed branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed: {status:?}");
    }

    /// A bare `origin` with one commit on `main`, plus a clone to work in.
    fn fixture() -> Option<(TempDir, PathBuf, PathBuf)> {
        which::which("git").ok()?;
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("origin.git");
        let work = tmp.path().join("work");
        run(tmp.path(), &["init", "--bare", "origin.git"]);
        run(tmp.path(), &["clone", "origin.git", "work"]);
        run(&work, &["config", "user.email", "bot@example.com"]);
        run(&work, &["config", "user.name", "bot"]);
        run(&work, &["config", "commit.gpgsign", "false"]);
        run(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(work.join("README.md"), "# repo\n").unwrap();
        run(&work, &["add", "README.md"]);
        run(&work, &["commit", "-m", "init"]);
        run(&work, &["push", "origin", "main"]);
        Some((tmp, origin, work))
    }

    #[test]
    fn open_rejects_non_repo() {
        if which::which("git").is_err() {
            return;
        }
        let dir = TempDir::new().unwrap();
        assert!(matches!(GitRepo::open(dir.path()), Err(TddError::Git { .. })));
    }

    #[test]
    fn creates_branch_from_main_commits_and_pushes() {
        let Some((_tmp, origin, work)) = fixture() else { return };
        let repo = GitRepo::open(&work).unwrap();
        assert_eq!(repo.main_branch(), "main");

        repo.checkout_branch("feature/ABC-1").unwrap();
        assert_eq!(repo.current_branch().unwrap(), "feature/ABC-1");

        std::fs::write(work.join("calc.py"), "x = 1\n").unwrap();
        let outcome = repo
            .stage_and_commit("feat(ABC-1): add calc", &["calc.py".to_string()])
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        repo.push("feature/ABC-1").unwrap();

        let out = Command::new("git")
            .args(["ls-remote", "--heads", origin.to_str().unwrap(), "feature/ABC-1"])
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&out.stdout).contains("refs/heads/feature/ABC-1"));
    }

    #[test]
    fn unchanged_files_are_nothing_to_commit() {
        let Some((_tmp, _origin, work)) = fixture() else { return };
        let repo = GitRepo::open(&work).unwrap();
        let outcome = repo.stage_and_commit("noop", &["README.md".to_string()]).unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
    }

    #[test]
    fn only_listed_files_are_staged() {
        let Some((_tmp, _origin, work)) = fixture() else { return };
        let repo = GitRepo::open(&work).unwrap();
        std::fs::write(work.join("a.txt"), "a").unwrap();
        std::fs::write(work.join("stray.txt"), "b").unwrap();
        repo.stage_and_commit("add a", &["a.txt".to_string()]).unwrap();

        let out = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(&work)
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "?? stray.txt");
    }

    #[test]
    fn checks_out_existing_remote_branch() {
        let Some((tmp, origin, work)) = fixture() else { return };
        run(&work, &["checkout", "-b", "feature/X-2"]);
        run(&work, &["push", "origin", "feature/X-2"]);

        let other = tmp.path().join("other");
        run(tmp.path(), &["clone", origin.to_str().unwrap(), "other"]);
        let repo = GitRepo::open(&other).unwrap();
        assert!(!repo.has_local_branch("feature/X-2"));
        repo.checkout_branch("feature/X-2").unwrap();
        assert_eq!(repo.current_branch().unwrap(), "feature/X-2");

        // Second run finds it locally.
        repo.checkout_branch("feature/X-2").unwrap();
        assert_eq!(repo.current_branch().unwrap(), "feature/X-2");
    }

    #[test]
    fn push_without_remote_branch_access_fails() {
        let Some((tmp, _origin, work)) = fixture() else { return };
        run(&work, &["remote", "set-url", "origin", tmp.path().join("gone.git").to_str().unwrap()]);
        let repo = GitRepo::open(&work).unwrap();
        assert!(matches!(repo.push("main"), Err(TddError::Git { command, .. }) if command == "push"));
    }
}
