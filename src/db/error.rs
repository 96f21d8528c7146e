//! Database error types.
//!
//! Storage-backend agnostic errors for the project/font store. Uses miette for
//! diagnostic output and thiserror for derive macros.

use miette::Diagnostic;
use thiserror::Error;

use super::validators::ValidationError;

/// Database operation errors.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Entity not found: {entity_type} with id '{id}'")]
    #[diagnostic(code(robocjk::db::not_found))]
    NotFound { entity_type: String, id: String },

    #[error("Entity already exists: {entity_type} with {field} '{value}'")]
    #[diagnostic(code(robocjk::db::already_exists))]
    AlreadyExists {
        entity_type: String,
        field: String,
        value: String,
    },

    #[error("Invalid data: {message} (hint: {help})")]
    #[diagnostic(code(robocjk::db::invalid_data))]
    InvalidData { message: String, help: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {message}")]
    #[diagnostic(code(robocjk::db::database_error))]
    Database { message: String },

    #[error("Migration error: {message}")]
    #[diagnostic(code(robocjk::db::migration_error))]
    Migration { message: String },

    #[error("Connection error: {message}")]
    #[diagnostic(code(robocjk::db::connection_error))]
    Connection { message: String },
}

impl DbError {
    pub(crate) fn database(e: impl std::fmt::Display) -> Self {
        DbError::Database {
            message: e.to_string(),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
