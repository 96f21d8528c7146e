//! Repository traits for data access abstraction.
//!
//! These traits define the contract the export flow relies on, allowing
//! different storage backends to be swapped without changing export logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{
    DbResult,
    models::{Font, ListResult, PageSort, Project},
};

/// Repository for Project operations.
pub trait ProjectRepository {
    /// Create a new project. The repository URL is validated before insert.
    async fn create(&self, project: &Project) -> DbResult<Project>;

    /// Get a project by uid.
    async fn get_by_id(&self, uid: &Uuid) -> DbResult<Project>;

    /// List projects ordered by creation time, one page at a time.
    async fn list_paginated(&self, page: &PageSort) -> DbResult<ListResult<Project>>;

    /// Delete a project and, by cascade, its fonts.
    async fn delete(&self, uid: &Uuid) -> DbResult<()>;
}

/// Repository for Font operations.
pub trait FontRepository {
    /// Create a new font under an existing project.
    async fn create(&self, font: &Font) -> DbResult<Font>;

    /// Get a font by uid.
    async fn get(&self, uid: &Uuid) -> DbResult<Font>;

    /// Replace a font's name and data, bumping `updated_at`.
    async fn update(&self, font: &Font) -> DbResult<Font>;

    /// All fonts of one project, ordered by name.
    async fn list_by_project(&self, project_uid: &Uuid) -> DbResult<Vec<Font>>;

    /// All fonts of several projects in a single query.
    async fn list_for_projects(&self, project_uids: &[Uuid]) -> DbResult<Vec<Font>>;

    /// Record that the given fonts were exported at `at`.
    async fn mark_exported(&self, font_uids: &[Uuid], at: DateTime<Utc>) -> DbResult<()>;
}

/// Combined database interface.
pub trait Database: Send + Sync {
    type Projects<'a>: ProjectRepository
    where
        Self: 'a;
    type Fonts<'a>: FontRepository
    where
        Self: 'a;

    /// Run pending migrations.
    async fn migrate(&self) -> DbResult<()>;

    /// Get the project repository.
    fn projects(&self) -> Self::Projects<'_>;

    /// Get the font repository.
    fn fonts(&self) -> Self::Fonts<'_>;
}
