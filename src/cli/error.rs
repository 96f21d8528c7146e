use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::orchestrator::OrchestratorError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error("Failed to load env settings from {}: {source}", .path.display())]
    #[diagnostic(
        code(robocjk::cli::env_file),
        help("The file must hold KEY=value lines; pass --env-file to use another file")
    )]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    #[diagnostic(
        code(robocjk::cli::database),
        help("Check DATABASE_URL or --database-url")
    )]
    Database(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("{failed} of {total} project export(s) failed")]
    #[diagnostic(code(robocjk::cli::exports_failed))]
    ExportsFailed { failed: usize, total: usize },
}

pub type CliResult<T> = Result<T, CliError>;
