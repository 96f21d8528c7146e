//! Project/font store.
//!
//! Trait-based abstractions for data access so the export flow does not depend
//! on a particular storage backend.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `models`: Domain entities (Project, Font) and pagination types
//! - `repository`: Trait definitions for data access
//! - `validators`: Field validation applied before persistence
//! - `sqlite`: SQLite implementation backed by sqlx

mod error;
mod models;
mod repository;
pub mod sqlite;
mod utils;
mod validators;


pub use error::{DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::SqliteDatabase;
pub use utils::current_timestamp;
pub use validators::{REPO_URL_MAX_LENGTH, RepoUrl, ValidationError};
