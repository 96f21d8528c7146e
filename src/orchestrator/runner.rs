//! Export run driver.

use futures_util::TryStreamExt;
use std::pin::pin;
use tracing::{Instrument, error, info, info_span};

use super::selector::{ProjectSelection, ProjectSelector};
use super::{ExportOutcome, ExportRequest, OrchestratorError};
use crate::db::{Database, ProjectWithFonts};
use crate::export::{ExportEngine, RunId};
use crate::sync::GitOps;

/// Runs the export command: one selection, one engine, projects in order.
pub struct Orchestrator<'a, D: Database, G: GitOps> {
    selector: ProjectSelector<'a, D>,
    engine: ExportEngine<'a, D, G>,
}

impl<'a, D: Database, G: GitOps> Orchestrator<'a, D, G> {
    pub fn new(selector: ProjectSelector<'a, D>, engine: ExportEngine<'a, D, G>) -> Self {
        Self { selector, engine }
    }

    /// Export the requested projects sequentially.
    ///
    /// A failed project export is recorded in its outcome and the run goes
    /// on. An unknown project uid or a database error while paging aborts the
    /// run.
    pub async fn run(
        &self,
        request: &ExportRequest,
    ) -> Result<Vec<ExportOutcome>, OrchestratorError> {
        self.run_with_id(request, RunId::new()).await
    }

    pub async fn run_with_id(
        &self,
        request: &ExportRequest,
        run_id: RunId,
    ) -> Result<Vec<ExportOutcome>, OrchestratorError> {
        let span = info_span!("export_run", pid = run_id.pid(), run_id = %run_id);

        async move {
            info!(
                project_uid = ?request.project_uid,
                full = request.full,
                "Export started"
            );

            match self.export_selection(request, &run_id).await {
                Ok(outcomes) => {
                    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
                    info!(
                        projects = outcomes.len(),
                        succeeded = outcomes.len() - failed,
                        failed,
                        "Export finished"
                    );
                    Ok(outcomes)
                }
                Err(e) => {
                    error!(error = %e, "Export aborted");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn export_selection(
        &self,
        request: &ExportRequest,
        run_id: &RunId,
    ) -> Result<Vec<ExportOutcome>, OrchestratorError> {
        let mut outcomes = Vec::new();

        match self.selector.select(request).await? {
            ProjectSelection::Single(target) => {
                outcomes.push(self.export_one(&target, request.full, run_id).await);
            }
            ProjectSelection::All(pages) => {
                let mut projects = pin!(pages.into_stream());
                while let Some(target) = projects.try_next().await? {
                    outcomes.push(self.export_one(&target, request.full, run_id).await);
                }
            }
        }

        Ok(outcomes)
    }

    async fn export_one(
        &self,
        target: &ProjectWithFonts,
        full: bool,
        run_id: &RunId,
    ) -> ExportOutcome {
        ExportOutcome {
            project_uid: target.project.uid,
            project_name: target.project.name.clone(),
            result: self.engine.export(target, full, run_id).await,
        }
    }
}
