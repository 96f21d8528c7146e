//! Export engine - runs one project export end to end.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::serialize::{font_dir_names, prune_stale_fonts, write_fonts};
use super::state::{ExportState, ExportStateMachine};
use super::{ExportError, ExportReport, RunId, commit_message};
use crate::db::{Database, Font, FontRepository, ProjectWithFonts};
use crate::sync::{
    CommitId, GitIdentity, GitOps, RepoClient, SyncError, WorkingCopy, working_copy_dir,
};

/// Settings shared by every export of a run.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Directory holding one working copy per project.
    pub repositories_path: PathBuf,
    /// Upper bound on the duration of a single project export.
    pub cancel_timeout: Duration,
    /// Author of export commits.
    pub identity: GitIdentity,
}

/// What an export has done so far, for rollback after failure.
#[derive(Default)]
struct Checkpoint {
    working_copy: Option<WorkingCopy>,
    /// Set once HEAD was read; the inner `None` means an unborn branch.
    prior_head: Option<Option<CommitId>>,
    /// The working copy directory did not exist before this export.
    fresh_clone: Option<PathBuf>,
    pushed: bool,
}

pub struct ExportEngine<'a, D: Database, G: GitOps> {
    db: &'a D,
    client: RepoClient<G>,
    settings: ExportSettings,
}

impl<'a, D: Database, G: GitOps> ExportEngine<'a, D, G> {
    pub fn new(db: &'a D, client: RepoClient<G>, settings: ExportSettings) -> Self {
        Self {
            db,
            client,
            settings,
        }
    }

    /// Export `target` into its repository.
    ///
    /// A full export writes every font and removes font directories that no
    /// longer belong to the project; an incremental one writes only fonts
    /// changed since their last export. The whole export is bounded by the
    /// cancel timeout. On failure the working copy is restored to the commit
    /// it started from unless the push already went through.
    pub async fn export(
        &self,
        target: &ProjectWithFonts,
        full: bool,
        run_id: &RunId,
    ) -> Result<ExportReport, ExportError> {
        let project = &target.project;
        let span = info_span!(
            "export_project",
            project = %project.uid,
            name = %project.name,
            full
        );

        async move {
            let timeout = self.settings.cancel_timeout;
            let mut machine = ExportStateMachine::new();
            let mut checkpoint = Checkpoint::default();

            let outcome = tokio::time::timeout(
                timeout,
                self.run_stages(target, full, run_id, &mut machine, &mut checkpoint),
            )
            .await;

            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(ExportError::Cancelled {
                    stage: machine.state(),
                    timeout,
                }),
            };

            match result {
                Ok(report) => {
                    match &report {
                        ExportReport::Exported {
                            commit,
                            fonts,
                            push_attempts,
                        } => info!(
                            commit = commit.short(),
                            fonts,
                            push_attempts,
                            "Project exported"
                        ),
                        ExportReport::Unchanged => info!("Project unchanged, nothing pushed"),
                    }
                    Ok(report)
                }
                Err(e) => {
                    let terminal = if e.is_cancelled() {
                        ExportState::Cancelled
                    } else {
                        ExportState::Failed
                    };
                    if let Err(transition) = machine.advance(terminal) {
                        warn!(error = %transition, "Could not record export failure state");
                    }

                    self.recover(&checkpoint).await;
                    error!(stage = %e.stage(), error = %e, "Project export failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        target: &ProjectWithFonts,
        full: bool,
        run_id: &RunId,
        machine: &mut ExportStateMachine,
        checkpoint: &mut Checkpoint,
    ) -> Result<ExportReport, ExportError> {
        let project = &target.project;

        machine.advance(ExportState::Collecting)?;
        let stage = machine.state();
        let local_path = working_copy_dir(&self.settings.repositories_path, &project.uid);
        if !local_path.join(".git").exists() {
            checkpoint.fresh_clone = Some(local_path.clone());
        }

        let wc = self
            .client
            .open_or_clone(&project.repo_url, &local_path)
            .await
            .map_err(|source| ExportError::Sync { stage, source })?;
        checkpoint.working_copy = Some(wc.clone());

        // Recorded before pulling too, so a cancelled pull still rolls back
        checkpoint.prior_head = Some(self.head(&wc, stage).await?);
        self.client.fast_forward(&wc).await;
        checkpoint.prior_head = Some(self.head(&wc, stage).await?);

        let selected: Vec<&Font> = target
            .fonts
            .iter()
            .filter(|font| full || font.has_unexported_changes())
            .collect();
        debug!(
            selected = selected.len(),
            total = target.fonts.len(),
            "Collected fonts"
        );

        machine.advance(ExportState::Serializing)?;
        let stage = machine.state();
        let serialize_err = |source| ExportError::Serialize { stage, source };

        let dir_names = font_dir_names(&target.fonts).map_err(serialize_err)?;
        let mut paths = write_fonts(wc.path(), &selected, &dir_names).map_err(serialize_err)?;
        if full {
            let removed = prune_stale_fonts(wc.path(), &dir_names).map_err(serialize_err)?;
            if !removed.is_empty() {
                info!(removed = ?removed, "Removed fonts no longer in the project");
            }
            paths.extend(removed);
        }

        machine.advance(ExportState::Committing)?;
        let stage = machine.state();
        let message = commit_message(full, chrono::Utc::now(), run_id);
        let exported: Vec<Uuid> = selected.iter().map(|font| font.uid).collect();

        let commit = match self
            .client
            .commit(&wc, &paths, &message, &self.settings.identity)
            .await
        {
            Ok(commit) => commit,
            Err(SyncError::NothingToCommit { .. }) => {
                // The repository already holds these fonts
                self.mark_exported(&exported, target, stage).await?;
                machine.advance(ExportState::Done)?;
                return Ok(ExportReport::Unchanged);
            }
            Err(source) => return Err(ExportError::Sync { stage, source }),
        };

        machine.advance(ExportState::Pushing)?;
        let stage = machine.state();
        let push = self
            .client
            .push(&wc)
            .await
            .map_err(|source| ExportError::Sync { stage, source })?;
        checkpoint.pushed = true;

        self.mark_exported(&exported, target, stage).await?;
        machine.advance(ExportState::Done)?;

        Ok(ExportReport::Exported {
            commit,
            fonts: exported.len(),
            push_attempts: push.attempts,
        })
    }

    async fn head(
        &self,
        wc: &WorkingCopy,
        stage: ExportState,
    ) -> Result<Option<CommitId>, ExportError> {
        self.client
            .head(wc)
            .await
            .map_err(|source| ExportError::Sync { stage, source })
    }

    async fn mark_exported(
        &self,
        fonts: &[Uuid],
        target: &ProjectWithFonts,
        stage: ExportState,
    ) -> Result<(), ExportError> {
        self.db
            .fonts()
            .mark_exported(fonts, target.loaded_at)
            .await
            .map_err(|source| ExportError::Database { stage, source })
    }

    /// Undo local effects of an export that did not complete.
    async fn recover(&self, checkpoint: &Checkpoint) {
        if checkpoint.pushed {
            return;
        }

        match (&checkpoint.working_copy, &checkpoint.prior_head) {
            (Some(wc), Some(prior_head)) => {
                if let Err(e) = self.client.rollback(wc, prior_head.as_ref()).await {
                    warn!(
                        path = %wc.path().display(),
                        error = %e,
                        "Rollback failed, the working copy may hold uncommitted export files"
                    );
                }
            }
            (None, _) => {
                // An interrupted clone leaves a directory that looks like a working copy
                let Some(path) = checkpoint.fresh_clone.as_ref().filter(|p| p.exists()) else {
                    return;
                };
                if let Err(e) = tokio::fs::remove_dir_all(path).await {
                    warn!(path = %path.display(), error = %e, "Could not remove partial clone");
                }
            }
            (Some(_), None) => {}
        }
    }
}
