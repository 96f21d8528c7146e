//! Project selection.

use futures_util::Stream;
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use uuid::Uuid;

use super::{ExportRequest, OrchestratorError};
use crate::db::{
    Database, DbError, DbResult, Font, FontRepository, PageCursor, PageSort, ProjectRepository,
    ProjectWithFonts, current_timestamp,
};

/// Projects chosen for an export run.
pub enum ProjectSelection<'a, D: Database> {
    Single(ProjectWithFonts),
    All(ProjectPages<'a, D>),
}

/// Lazy, finite sequence of every project ordered by creation time.
///
/// Pages are fetched on demand; the fonts of a page's projects are loaded
/// together in one query. Each page resumes after the last project seen, so
/// projects deleted mid-run never cause another to be skipped. Iterating
/// again requires a new selection.
pub struct ProjectPages<'a, D: Database> {
    db: &'a D,
    page_size: usize,
    after: Option<PageCursor>,
    fetched: usize,
    buffer: VecDeque<ProjectWithFonts>,
    exhausted: bool,
}

impl<'a, D: Database> ProjectPages<'a, D> {
    fn new(db: &'a D, page_size: usize) -> Self {
        Self {
            db,
            page_size: page_size.max(1),
            after: None,
            fetched: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// The next project, fetching a new page when the current one is used up.
    pub async fn next_project(&mut self) -> DbResult<Option<ProjectWithFonts>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    pub fn into_stream(self) -> impl Stream<Item = DbResult<ProjectWithFonts>> + 'a {
        futures_util::stream::try_unfold(self, |mut pages| async move {
            let next = pages.next_project().await?;
            Ok::<_, DbError>(next.map(|project| (project, pages)))
        })
    }

    async fn fetch_page(&mut self) -> DbResult<()> {
        let loaded_at = current_timestamp();
        let page = self
            .db
            .projects()
            .list_paginated(&PageSort::page(self.after, self.page_size))
            .await?;

        self.fetched += page.items.len();
        self.after = page.next.or(self.after);
        self.exhausted = page.items.len() < self.page_size;
        debug!(
            projects = page.items.len(),
            fetched = self.fetched,
            total = page.total,
            "Fetched project page"
        );

        if page.items.is_empty() {
            return Ok(());
        }

        let uids: Vec<Uuid> = page.items.iter().map(|p| p.uid).collect();
        let mut fonts_by_project: HashMap<Uuid, Vec<Font>> = HashMap::new();
        for font in self.db.fonts().list_for_projects(&uids).await? {
            fonts_by_project
                .entry(font.project_uid)
                .or_default()
                .push(font);
        }

        self.buffer
            .extend(page.items.into_iter().map(|project| ProjectWithFonts {
                fonts: fonts_by_project.remove(&project.uid).unwrap_or_default(),
                project,
                loaded_at,
            }));
        Ok(())
    }
}

/// Resolves export requests against the store.
pub struct ProjectSelector<'a, D: Database> {
    db: &'a D,
    page_size: usize,
}

impl<'a, D: Database> ProjectSelector<'a, D> {
    pub fn new(db: &'a D, page_size: usize) -> Self {
        Self { db, page_size }
    }

    /// A single project with its fonts when the request names one, otherwise
    /// every project. An unknown uid is an error.
    pub async fn select(
        &self,
        request: &ExportRequest,
    ) -> Result<ProjectSelection<'a, D>, OrchestratorError> {
        let Some(uid) = request.project_uid else {
            return Ok(ProjectSelection::All(ProjectPages::new(
                self.db,
                self.page_size,
            )));
        };

        let loaded_at = current_timestamp();
        let project = match self.db.projects().get_by_id(&uid).await {
            Ok(project) => project,
            Err(DbError::NotFound { .. }) => {
                return Err(OrchestratorError::ProjectNotFound { uid });
            }
            Err(e) => return Err(e.into()),
        };
        let fonts = self.db.fonts().list_by_project(&uid).await?;

        Ok(ProjectSelection::Single(ProjectWithFonts {
            project,
            fonts,
            loaded_at,
        }))
    }
}
