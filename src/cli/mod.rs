//! `export_rcjk` command line.

pub mod error;
mod summary;

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ExportConfig;
use crate::db::{Database, SqliteDatabase};
use crate::export::ExportEngine;
use crate::logging;
use crate::orchestrator::{ExportRequest, Orchestrator, ProjectSelector};
use crate::sync::{RealGit, RepoClient};

pub use error::{CliError, CliResult};
pub use summary::format_summary;

#[derive(Parser, Debug)]
#[command(name = "export_rcjk")]
#[command(author, version, about = "Export RoboCJK projects to their git repositories", long_about = None)]
pub struct Cli {
    /// Export only the project with this uid (default: all projects)
    #[arg(long)]
    pub project_uid: Option<Uuid>,

    /// Rewrite every font instead of only those changed since the last export
    #[arg(long)]
    pub full: bool,

    /// Exit with an error when any project export failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// KEY=value settings file, loaded when it exists
    #[arg(long, default_value = "conf/env_settings")]
    pub env_file: PathBuf,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn request(&self) -> ExportRequest {
        ExportRequest {
            project_uid: self.project_uid,
            full: self.full,
        }
    }
}

pub async fn run() -> CliResult<()> {
    execute(Cli::parse()).await
}

/// Run the export described by `cli` against the real git binary.
pub async fn execute(cli: Cli) -> CliResult<()> {
    // The env file may carry RUST_LOG, so it is read before tracing starts
    let loaded = load_env_file(&cli.env_file)?;
    logging::init_tracing(cli.verbose);
    if loaded {
        debug!(path = %cli.env_file.display(), "Loaded env settings file");
    } else {
        debug!(path = %cli.env_file.display(), "No env settings file");
    }

    let mut config = ExportConfig::from_env()?;
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }

    info!(database = %config.database_url, "Opening database");
    let db = SqliteDatabase::open_existing(&config.database_url).await?;
    db.migrate().await?;

    let client = RepoClient::new(RealGit::new(), config.retry_config());
    let engine = ExportEngine::new(&db, client, config.export_settings());
    let orchestrator = Orchestrator::new(ProjectSelector::new(&db, config.page_size), engine);

    let outcomes = orchestrator.run(&cli.request()).await?;
    println!("{}", format_summary(&outcomes));

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if cli.fail_on_error && failed > 0 {
        return Err(CliError::ExportsFailed {
            failed,
            total: outcomes.len(),
        });
    }

    Ok(())
}

/// Load `path` into the environment if it exists and report whether it did.
/// Variables already set win.
pub fn load_env_file(path: &Path) -> CliResult<bool> {
    if !path.exists() {
        return Ok(false);
    }

    dotenvy::from_path(path).map_err(|source| CliError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}
