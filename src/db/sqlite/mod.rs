//! SQLite implementation of the database traits.
//!
//! This module provides a sqlx-backed implementation of the repository
//! traits defined in the parent module.

mod connection;
mod font;
mod helpers;
mod project;


pub use connection::SqliteDatabase;
pub use font::SqliteFontRepository;
pub use project::SqliteProjectRepository;
