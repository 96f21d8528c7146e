//! Domain models for the project/font store.
//!
//! These models are storage-agnostic and represent the entities the export
//! flow reads and updates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// =============================================================================
// Pagination
// =============================================================================

/// Position of a project in creation order. Pages resume strictly after it,
/// so rows deleted or added behind the cursor never shift later pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub uid: Uuid,
}

impl PageCursor {
    pub fn of(project: &Project) -> Self {
        Self {
            created_at: project.created_at,
            uid: project.uid,
        }
    }
}

/// Pagination options for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSort {
    /// Maximum number of items to return.
    pub limit: Option<usize>,
    /// Return only items after this one.
    pub after: Option<PageCursor>,
}

impl PageSort {
    /// The page following `after` (or the first page) holding at most
    /// `limit` items.
    pub fn page(after: Option<PageCursor>, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            after,
        }
    }
}

/// Result of a paginated list query.
#[derive(Debug, Clone)]
pub struct ListResult<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total count of all matching items (before pagination).
    pub total: usize,
    /// Limit that was applied.
    pub limit: Option<usize>,
    /// Cursor to pass for the following page, `None` on an empty page.
    pub next: Option<PageCursor>,
}

// =============================================================================
// Entities
// =============================================================================

/// A font project exported to its own git repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub uid: Uuid,
    pub name: String,
    /// SSH URL of the project's git remote, validated before persistence.
    pub repo_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// A project that has not been persisted yet. The store assigns timestamps.
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: Uuid::new_v4(),
            name: name.into(),
            repo_url: repo_url.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A font belonging to exactly one project.
///
/// `data` is the font's design payload; the export flow treats it as opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub uid: Uuid,
    pub project_uid: Uuid,
    pub name: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the font's current content was last pushed, if ever.
    pub exported_at: Option<DateTime<Utc>>,
}

impl Font {
    pub fn new(project_uid: Uuid, name: impl Into<String>, data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            uid: Uuid::new_v4(),
            project_uid,
            name: name.into(),
            data,
            created_at: now,
            updated_at: now,
            exported_at: None,
        }
    }

    /// True when the font was never exported or changed since its last export.
    pub fn has_unexported_changes(&self) -> bool {
        self.exported_at
            .is_none_or(|exported_at| self.updated_at > exported_at)
    }
}

/// A project together with its fonts, loaded in one round trip per page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectWithFonts {
    pub project: Project,
    pub fonts: Vec<Font>,
    /// Taken before the fonts were read. Edits after this instant are not in
    /// `fonts` and must stay pending after an export.
    pub loaded_at: DateTime<Utc>,
}
