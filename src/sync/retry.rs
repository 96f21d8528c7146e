//! Push retry policy.
//!
//! Transient network and SSH failures are retried with exponential backoff.
//! Rejections (non-fast-forward, remote hooks) mean the remote diverged and
//! need a human; they are never retried.

use std::time::Duration;

use super::git::GitError;

/// Configuration for retry behavior on transient push errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// Retry policy without any sleeping, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retrying after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

/// How a failed push should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushErrorKind {
    /// Network or SSH blip, worth another attempt.
    Retryable,
    /// The remote refused the update; retrying cannot help.
    Rejected,
    /// Anything else.
    Fatal,
}

const REJECTION_MARKERS: &[&str] = &[
    "[rejected]",
    "[remote rejected]",
    "non-fast-forward",
    "fetch first",
    "Updates were rejected",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "Could not resolve host",
    "Connection timed out",
    "Connection refused",
    "Connection reset",
    "Connection closed",
    "Operation timed out",
    "Network is unreachable",
    "The remote end hung up unexpectedly",
    "early EOF",
    "kex_exchange_identification",
    "ssh_exchange_identification",
    "Could not read from remote repository",
];

/// Classify a push failure.
///
/// The transient predicate is intentionally narrow so that genuine failures
/// surface after one attempt.
pub fn classify_push_error(error: &GitError) -> PushErrorKind {
    match error {
        GitError::NonZeroExit { output, .. } => {
            if REJECTION_MARKERS.iter().any(|m| output.contains(m)) {
                PushErrorKind::Rejected
            } else if TRANSIENT_MARKERS.iter().any(|m| output.contains(m)) {
                PushErrorKind::Retryable
            } else {
                PushErrorKind::Fatal
            }
        }
        GitError::CommandFailed(_) | GitError::GitNotFound => PushErrorKind::Fatal,
    }
}
