//! Sync module - git working copies for project exports.
//!
//! Each project is exported into its own working copy which is committed and
//! pushed to the project's remote repository.

#[cfg(test)]
pub(crate) mod fake_git;
mod git;
mod paths;
mod retry;
mod working_copy;

#[cfg(test)]
pub use git::MockGitOps;
pub use git::{GitError, GitOps, RealGit};
pub use paths::working_copy_dir;
pub use retry::{PushErrorKind, RetryConfig, classify_push_error};
pub use working_copy::{
    CommitId, GitIdentity, PushReport, RepoClient, SyncError, WorkingCopy,
};
