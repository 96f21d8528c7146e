//! Git operations for working-copy synchronization.
//!
//! This module provides a trait-based abstraction over git commands
//! to enable easy mocking in tests. The real implementation shells out to
//! `git` through `tokio::process`; child processes are killed when their
//! future is dropped, which is how the export timeout interrupts git.

use miette::Diagnostic;
use std::path::Path;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;

#[cfg(test)]
use mockall::automock;

/// Errors that can occur during git operations.
#[derive(Error, Diagnostic, Debug)]
pub enum GitError {
    #[error("Git command failed: {0}")]
    #[diagnostic(code(robocjk::sync::git::command_failed))]
    CommandFailed(String),

    #[error("Git command returned non-zero exit code {code}: {output}")]
    #[diagnostic(code(robocjk::sync::git::non_zero_exit))]
    NonZeroExit { code: i32, output: String },

    #[error("Git not installed or not in PATH")]
    #[diagnostic(code(robocjk::sync::git::not_found))]
    GitNotFound,
}

/// Trait for git operations. Can be mocked in tests.
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Clone `url` into `dest`. The parent of `dest` must exist.
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<Output, GitError>;

    /// Get the URL of a remote.
    async fn remote_get_url(&self, path: &Path, name: &str) -> Result<Output, GitError>;

    /// Point an existing remote at a new URL.
    async fn remote_set_url(
        &self,
        path: &Path,
        name: &str,
        url: &str,
    ) -> Result<Output, GitError>;

    /// Fast-forward the current branch from a remote.
    async fn pull(&self, path: &Path, remote: &str) -> Result<Output, GitError>;

    /// Get repository status in porcelain format.
    async fn status_porcelain(&self, path: &Path) -> Result<Output, GitError>;

    /// Stage additions, modifications and deletions under the given paths.
    async fn add_files(&self, path: &Path, files: &[String]) -> Result<Output, GitError>;

    /// Create a commit with the given message and author identity.
    async fn commit(
        &self,
        path: &Path,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<Output, GitError>;

    /// Resolve HEAD to a commit hash. Fails on an unborn branch.
    async fn rev_parse_head(&self, path: &Path) -> Result<Output, GitError>;

    /// Push the current branch to the same-named branch of a remote.
    async fn push(&self, path: &Path, remote: &str) -> Result<Output, GitError>;

    /// Reset index and working tree to `rev`.
    async fn reset_hard(&self, path: &Path, rev: &str) -> Result<Output, GitError>;

    /// Drop every commit and staged entry, back to an unborn branch.
    async fn reset_unborn(&self, path: &Path) -> Result<Output, GitError>;

    /// Remove untracked files and directories.
    async fn clean(&self, path: &Path) -> Result<Output, GitError>;
}

/// Real implementation of GitOps using the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct RealGit {
    /// Extra variables set on every git child process.
    env: Vec<(String, String)>,
}

impl RealGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` for every git command run by this handler, overriding the
    /// inherited environment and the built-in SSH defaults.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Helper to run a git command and return the output.
    async fn run_git(&self, path: &Path, args: &[&str]) -> Result<Output, GitError> {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(path)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        // Never block on an interactive SSH prompt
        if std::env::var_os("GIT_SSH_COMMAND").is_none() {
            command.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        }
        command.envs(self.env.iter().map(|(key, value)| (key, value)));

        command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::GitNotFound
            } else {
                GitError::CommandFailed(e.to_string())
            }
        })
    }

    async fn run_checked(&self, path: &Path, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run_git(path, args).await?;
        check_output(output)
    }
}

/// Check if the output indicates success, otherwise return an error.
pub(crate) fn check_output(output: Output) -> Result<Output, GitError> {
    if output.status.success() {
        Ok(output)
    } else {
        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        // Combine stdout and stderr for error message
        let combined = if !stdout.is_empty() && !stderr.is_empty() {
            format!("{}\n{}", stdout, stderr)
        } else if !stdout.is_empty() {
            stdout
        } else {
            stderr
        };
        Err(GitError::NonZeroExit {
            code,
            output: combined,
        })
    }
}

/// True when `git status --porcelain` output lists at least one staged entry.
pub(crate) fn has_staged_changes(porcelain: &str) -> bool {
    porcelain.lines().any(|line| {
        let index_status = line.chars().next().unwrap_or(' ');
        index_status != ' ' && index_status != '?' && index_status != '!'
    })
}

impl GitOps for RealGit {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<Output, GitError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let dest = dest.to_string_lossy();
        self.run_checked(parent, &["clone", "--", url, &dest]).await
    }

    async fn remote_get_url(&self, path: &Path, name: &str) -> Result<Output, GitError> {
        self.run_checked(path, &["remote", "get-url", name]).await
    }

    async fn remote_set_url(
        &self,
        path: &Path,
        name: &str,
        url: &str,
    ) -> Result<Output, GitError> {
        self.run_checked(path, &["remote", "set-url", name, url])
            .await
    }

    async fn pull(&self, path: &Path, remote: &str) -> Result<Output, GitError> {
        self.run_checked(path, &["pull", "--ff-only", remote]).await
    }

    async fn status_porcelain(&self, path: &Path) -> Result<Output, GitError> {
        self.run_checked(path, &["status", "--porcelain"]).await
    }

    async fn add_files(&self, path: &Path, files: &[String]) -> Result<Output, GitError> {
        let mut args = vec!["add", "--all", "--"];
        args.extend(files.iter().map(|s| s.as_str()));
        self.run_checked(path, &args).await
    }

    async fn commit(
        &self,
        path: &Path,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<Output, GitError> {
        let name = format!("user.name={}", author_name);
        let email = format!("user.email={}", author_email);
        self.run_checked(path, &["-c", &name, "-c", &email, "commit", "-m", message])
            .await
    }

    async fn rev_parse_head(&self, path: &Path) -> Result<Output, GitError> {
        self.run_checked(path, &["rev-parse", "--verify", "HEAD"])
            .await
    }

    async fn push(&self, path: &Path, remote: &str) -> Result<Output, GitError> {
        self.run_checked(path, &["push", "--porcelain", remote, "HEAD"])
            .await
    }

    async fn reset_hard(&self, path: &Path, rev: &str) -> Result<Output, GitError> {
        self.run_checked(path, &["reset", "--hard", rev]).await
    }

    async fn reset_unborn(&self, path: &Path) -> Result<Output, GitError> {
        // update-ref fails when HEAD is already unborn; only the index matters then
        let _ = self.run_git(path, &["update-ref", "-d", "HEAD"]).await?;
        self.run_checked(path, &["read-tree", "--empty"]).await
    }

    async fn clean(&self, path: &Path) -> Result<Output, GitError> {
        self.run_checked(path, &["clean", "-fd"]).await
    }
}
