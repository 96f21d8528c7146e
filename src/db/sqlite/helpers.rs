//! Shared helper functions for SQLite repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::db::{DbError, DbResult, PageSort};

/// Build the LIMIT clause from PageSort parameters.
pub fn build_limit_clause(page: &PageSort) -> String {
    page.limit
        .map(|limit| format!(" LIMIT {}", limit))
        .unwrap_or_default()
}

/// Keyset condition selecting rows ordered after `page.after` by
/// `(created_at, uid)`, with the values to bind in order.
pub fn build_after_clause(page: &PageSort) -> (String, Vec<String>) {
    match &page.after {
        Some(after) => {
            let created_at = encode_timestamp(&after.created_at);
            (
                " WHERE (created_at > ? OR (created_at = ? AND uid > ?))".to_string(),
                vec![created_at.clone(), created_at, after.uid.to_string()],
            )
        }
        None => (String::new(), Vec::new()),
    }
}

/// `?, ?, ?` with `count` placeholders.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Fixed-width RFC 3339 so that text ordering matches chronological ordering.
pub fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData {
            message: format!("invalid timestamp '{}': {}", value, e),
            help: "Timestamps are stored as RFC 3339 strings".to_string(),
        })
}

pub fn decode_uid(value: &str) -> DbResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| DbError::InvalidData {
        message: format!("invalid uid '{}': {}", value, e),
        help: "Uids are stored as hyphenated UUID strings".to_string(),
    })
}
