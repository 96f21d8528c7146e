//! Repository sync client - working-copy level operations.
//!
//! Coordinates git operations for one project's working copy: clone or open,
//! commit, push with retries, and rollback.

use miette::Diagnostic;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::git::{GitError, GitOps, has_staged_changes};
use super::retry::{PushErrorKind, RetryConfig, classify_push_error};
use crate::db::RepoUrl;

const REMOTE: &str = "origin";

/// Errors that can occur during working-copy operations.
#[derive(Error, Diagnostic, Debug)]
pub enum SyncError {
    #[error("Repository {url} unavailable: {reason}")]
    #[diagnostic(code(robocjk::sync::repo_unavailable))]
    RepoUnavailable { url: String, reason: String },

    #[error("Nothing to commit in {}", .path.display())]
    #[diagnostic(code(robocjk::sync::nothing_to_commit))]
    NothingToCommit { path: PathBuf },

    #[error("Push to {url} rejected, the remote has diverged: {output}")]
    #[diagnostic(
        code(robocjk::sync::push_rejected),
        help("Another export pushed first or the remote was edited; reconcile the repository manually")
    )]
    Rejected { url: String, output: String },

    #[error("Push to {url} failed after {attempts} attempt(s): {source}")]
    #[diagnostic(code(robocjk::sync::push_failed))]
    PushFailed {
        url: String,
        attempts: u32,
        #[source]
        source: GitError,
    },

    #[error("Git error: {0}")]
    #[diagnostic(code(robocjk::sync::git))]
    Git(#[from] GitError),

    #[error("IO error: {0}")]
    #[diagnostic(code(robocjk::sync::io))]
    Io(#[from] std::io::Error),
}

/// Full hash of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author identity used for export commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// A local git working copy mirroring a project's remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    path: PathBuf,
    repo_url: RepoUrl,
}

impl WorkingCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo_url(&self) -> &RepoUrl {
        &self.repo_url
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub attempts: u32,
}

/// Working-copy client. Holds no state across calls besides the git handler.
pub struct RepoClient<G: GitOps> {
    git: G,
    retry: RetryConfig,
}

impl<G: GitOps> RepoClient<G> {
    pub fn new(git: G, retry: RetryConfig) -> Self {
        Self { git, retry }
    }

    /// Open the working copy at `local_path`, cloning `repo_url` first if it
    /// does not exist yet. An existing copy has its remote URL brought in line
    /// with `repo_url` but is not pulled; see [`RepoClient::fast_forward`].
    pub async fn open_or_clone(
        &self,
        repo_url: &str,
        local_path: &Path,
    ) -> Result<WorkingCopy, SyncError> {
        let url = RepoUrl::parse(repo_url).map_err(|e| SyncError::RepoUnavailable {
            url: repo_url.to_string(),
            reason: e.to_string(),
        })?;

        if local_path.join(".git").exists() {
            self.ensure_remote(&url, local_path).await?;
        } else {
            if let Some(parent) = local_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            info!(
                url = %url,
                host = url.host(),
                repo = url.repo_name(),
                path = %local_path.display(),
                "Cloning repository"
            );
            self.git
                .clone_repo(url.as_str(), local_path)
                .await
                .map_err(|e| SyncError::RepoUnavailable {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(WorkingCopy {
            path: local_path.to_path_buf(),
            repo_url: url,
        })
    }

    /// Pull the remote into an opened working copy. Failure is only logged:
    /// an empty remote has nothing to pull and a diverged one is caught at push.
    pub async fn fast_forward(&self, wc: &WorkingCopy) {
        if let Err(e) = self.git.pull(&wc.path, REMOTE).await {
            warn!(
                path = %wc.path.display(),
                repo = wc.repo_url.repo_name(),
                error = %e,
                "Pull before export failed"
            );
        }
    }

    async fn ensure_remote(&self, url: &RepoUrl, path: &Path) -> Result<(), SyncError> {
        let current = self
            .git
            .remote_get_url(path, REMOTE)
            .await
            .ok()
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

        if current.as_deref() != Some(url.as_str()) {
            info!(path = %path.display(), url = %url, "Updating remote URL");
            self.git
                .remote_set_url(path, REMOTE, url.as_str())
                .await
                .map_err(|e| SyncError::RepoUnavailable {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(())
    }

    /// Current HEAD, or `None` when no commit exists yet.
    pub async fn head(&self, wc: &WorkingCopy) -> Result<Option<CommitId>, SyncError> {
        match self.git.rev_parse_head(&wc.path).await {
            Ok(output) => {
                let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!hash.is_empty()).then(|| CommitId::new(hash)))
            }
            Err(GitError::NonZeroExit { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stage `paths` and commit them. Fails with `NothingToCommit` when the
    /// staged tree matches HEAD.
    pub async fn commit(
        &self,
        wc: &WorkingCopy,
        paths: &[String],
        message: &str,
        author: &GitIdentity,
    ) -> Result<CommitId, SyncError> {
        if paths.is_empty() {
            return Err(SyncError::NothingToCommit {
                path: wc.path.clone(),
            });
        }

        self.git.add_files(&wc.path, paths).await?;

        let status = self.git.status_porcelain(&wc.path).await?;
        if !has_staged_changes(&String::from_utf8_lossy(&status.stdout)) {
            return Err(SyncError::NothingToCommit {
                path: wc.path.clone(),
            });
        }

        self.git
            .commit(&wc.path, message, &author.name, &author.email)
            .await?;

        let commit = self.head(wc).await?.ok_or_else(|| {
            SyncError::Git(GitError::CommandFailed(
                "HEAD is unborn right after committing".to_string(),
            ))
        })?;
        debug!(commit = %commit, "Committed export");

        Ok(commit)
    }

    /// Push HEAD to the remote, retrying transient failures with backoff.
    pub async fn push(&self, wc: &WorkingCopy) -> Result<PushReport, SyncError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match self.git.push(&wc.path, REMOTE).await {
                Ok(_) => return Ok(PushReport { attempts: attempt }),
                Err(e) => e,
            };

            match classify_push_error(&error) {
                PushErrorKind::Rejected => {
                    let output = match error {
                        GitError::NonZeroExit { output, .. } => output,
                        other => other.to_string(),
                    };
                    return Err(SyncError::Rejected {
                        url: wc.repo_url.to_string(),
                        output,
                    });
                }
                PushErrorKind::Retryable if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        url = %wc.repo_url,
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %error,
                        "Transient push failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                PushErrorKind::Retryable | PushErrorKind::Fatal => {
                    return Err(SyncError::PushFailed {
                        url: wc.repo_url.to_string(),
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }

    /// Restore the working copy to `to`, or to an empty unborn branch when the
    /// repository had no commits. Untracked files are removed.
    ///
    /// Lock files left by a git process that was killed mid-command are
    /// deleted first, otherwise the reset itself would fail on them.
    pub async fn rollback(
        &self,
        wc: &WorkingCopy,
        to: Option<&CommitId>,
    ) -> Result<(), SyncError> {
        let cleared = clear_stale_locks(&wc.path).await?;
        if !cleared.is_empty() {
            warn!(
                path = %wc.path.display(),
                locks = ?cleared,
                "Removed stale git lock files"
            );
        }

        match to {
            Some(commit) => {
                self.git.reset_hard(&wc.path, commit.as_str()).await?;
            }
            None => {
                self.git.reset_unborn(&wc.path).await?;
            }
        }
        self.git.clean(&wc.path).await?;

        info!(
            path = %wc.path.display(),
            commit = to.map(CommitId::short).unwrap_or("<none>"),
            "Rolled back working copy"
        );
        Ok(())
    }
}

/// Lock files git takes at the top of `.git`.
const GIT_DIR_LOCKS: [&str; 5] = [
    "index.lock",
    "HEAD.lock",
    "ORIG_HEAD.lock",
    "FETCH_HEAD.lock",
    "config.lock",
];

/// Remove lock files under `<path>/.git` and return their paths relative to
/// the working copy. Covers the top-level locks plus any `*.lock` below
/// `.git/refs`.
pub(crate) async fn clear_stale_locks(path: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let git_dir = path.join(".git");
    let mut candidates: Vec<PathBuf> =
        GIT_DIR_LOCKS.iter().map(|name| git_dir.join(name)).collect();

    let mut pending = vec![git_dir.join("refs")];
    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(entry_path);
            } else if entry_path.extension().is_some_and(|ext| ext == "lock") {
                candidates.push(entry_path);
            }
        }
    }

    let mut cleared = Vec::new();
    for lock in candidates {
        match tokio::fs::remove_file(&lock).await {
            Ok(()) => {
                let relative = lock.strip_prefix(path).unwrap_or(&lock).to_path_buf();
                cleared.push(relative);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(cleared)
}
