//! Command orchestration - selects projects and exports them one by one.
//!
//! - `selector`: resolves an [`ExportRequest`] into one project or a lazy
//!   paginated sequence of all projects
//! - `runner`: drives the export engine over the selection and collects a
//!   per-project [`ExportOutcome`]

mod runner;
mod selector;

use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DbError;
use crate::export::{ExportError, ExportReport};

pub use runner::Orchestrator;
pub use selector::{ProjectPages, ProjectSelection, ProjectSelector};

/// What the user asked to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportRequest {
    /// Export only this project; all projects when `None`.
    pub project_uid: Option<Uuid>,
    /// Rewrite every font instead of only those changed since their last export.
    pub full: bool,
}

/// Result of exporting one project.
#[derive(Debug)]
pub struct ExportOutcome {
    pub project_uid: Uuid,
    pub project_name: String,
    pub result: Result<ExportReport, ExportError>,
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Errors that abort a whole export run.
#[derive(Error, Diagnostic, Debug)]
pub enum OrchestratorError {
    #[error("Project with uid {uid} not found")]
    #[diagnostic(
        code(robocjk::orchestrator::project_not_found),
        help("Check the --project-uid value against the projects in the database")
    )]
    ProjectNotFound { uid: Uuid },

    #[error("Database error while selecting projects: {0}")]
    #[diagnostic(code(robocjk::orchestrator::database))]
    Database(#[from] DbError),
}
