//! Export engine - writes a project's fonts into its git working copy,
//! commits and pushes them.
//!
//! One export runs through the stages of [`ExportStateMachine`] under a
//! cancel timeout. A failed or cancelled export rolls the working copy back
//! to the commit it started from; nothing partial is pushed.

mod engine;
mod serialize;
mod state;

use chrono::{DateTime, SecondsFormat, Utc};
use miette::Diagnostic;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DbError;
use crate::sync::{CommitId, SyncError};

pub use engine::{ExportEngine, ExportSettings};
pub use serialize::{
    FONT_DIR_SUFFIX, FONT_FILE_NAME, SerializeError, font_dir_name, font_dir_names,
    prune_stale_fonts, render_font, write_fonts,
};
pub use state::{ExportState, ExportStateMachine, TransitionError};

/// Identifies one invocation of the export command in logs and commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId {
    pid: u32,
    run: Uuid,
}

impl RunId {
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
            run: Uuid::new_v4(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn run(&self) -> Uuid {
        self.run
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pid, self.run.simple())
    }
}

/// What a successful export did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReport {
    /// A commit was created and pushed.
    Exported {
        commit: CommitId,
        fonts: usize,
        push_attempts: u32,
    },
    /// The repository already held the project's current fonts.
    Unchanged,
}

#[derive(Error, Diagnostic, Debug)]
pub enum ExportError {
    #[error("Export cancelled while {stage} after exceeding the {}s timeout", .timeout.as_secs())]
    #[diagnostic(
        code(robocjk::export::cancelled),
        help("Raise ROBOCJK_EXPORT_CANCEL_TIMEOUT if exports of this size are expected")
    )]
    Cancelled { stage: ExportState, timeout: Duration },

    #[error("Export failed while {stage}: {source}")]
    #[diagnostic(code(robocjk::export::sync))]
    Sync {
        stage: ExportState,
        #[source]
        source: SyncError,
    },

    #[error("Export failed while {stage}: {source}")]
    #[diagnostic(code(robocjk::export::serialize))]
    Serialize {
        stage: ExportState,
        #[source]
        source: SerializeError,
    },

    #[error("Export failed while {stage}: {source}")]
    #[diagnostic(code(robocjk::export::database))]
    Database {
        stage: ExportState,
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    #[diagnostic(code(robocjk::export::invalid_transition))]
    InvalidTransition(#[from] TransitionError),
}

impl ExportError {
    /// The stage the export was in when it stopped.
    pub fn stage(&self) -> ExportState {
        match self {
            ExportError::Cancelled { stage, .. }
            | ExportError::Sync { stage, .. }
            | ExportError::Serialize { stage, .. }
            | ExportError::Database { stage, .. } => *stage,
            ExportError::InvalidTransition(e) => e.from,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled { .. })
    }

    /// True when the remote refused the push because it had diverged.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ExportError::Sync {
                source: SyncError::Rejected { .. },
                ..
            }
        )
    }
}

/// Commit message for an export: `Export (<full|incremental>) <timestamp> run <run id>`.
pub fn commit_message(full: bool, at: DateTime<Utc>, run_id: &RunId) -> String {
    let mode = if full { "full" } else { "incremental" };
    format!(
        "Export ({}) {} run {}",
        mode,
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        run_id
    )
}
