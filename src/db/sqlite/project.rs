//! SQLite ProjectRepository implementation.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::helpers::{
    build_after_clause, build_limit_clause, decode_timestamp, decode_uid, encode_timestamp,
};
use crate::db::utils::current_timestamp;
use crate::db::{
    DbError, DbResult, ListResult, PageCursor, PageSort, Project, ProjectRepository, RepoUrl,
};

/// SQLx-backed project repository.
pub struct SqliteProjectRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn project_from_row(row: &SqliteRow) -> DbResult<Project> {
    let uid: String = row.try_get("uid").map_err(DbError::database)?;
    let created_at: String = row.try_get("created_at").map_err(DbError::database)?;
    let updated_at: String = row.try_get("updated_at").map_err(DbError::database)?;

    Ok(Project {
        uid: decode_uid(&uid)?,
        name: row.try_get("name").map_err(DbError::database)?,
        repo_url: row.try_get("repo_url").map_err(DbError::database)?,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

impl<'a> ProjectRepository for SqliteProjectRepository<'a> {
    async fn create(&self, project: &Project) -> DbResult<Project> {
        let repo_url = RepoUrl::parse(&project.repo_url)?;

        let uid = if project.uid.is_nil() {
            Uuid::new_v4()
        } else {
            project.uid
        };

        // Always generate current timestamps - never use input timestamps
        let created_at = current_timestamp();
        let updated_at = created_at;

        sqlx::query(
            "INSERT INTO project (uid, name, repo_url, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uid.to_string())
        .bind(&project.name)
        .bind(repo_url.as_str())
        .bind(encode_timestamp(&created_at))
        .bind(encode_timestamp(&updated_at))
        .execute(self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                if db_err.message().contains("repo_url") {
                    DbError::AlreadyExists {
                        entity_type: "Project".to_string(),
                        field: "repo_url".to_string(),
                        value: repo_url.to_string(),
                    }
                } else {
                    DbError::AlreadyExists {
                        entity_type: "Project".to_string(),
                        field: "uid".to_string(),
                        value: uid.to_string(),
                    }
                }
            }
            _ => DbError::database(e),
        })?;

        Ok(Project {
            uid,
            name: project.name.clone(),
            repo_url: repo_url.to_string(),
            created_at,
            updated_at,
        })
    }

    async fn get_by_id(&self, uid: &Uuid) -> DbResult<Project> {
        let row = sqlx::query(
            "SELECT uid, name, repo_url, created_at, updated_at FROM project WHERE uid = ?",
        )
        .bind(uid.to_string())
        .fetch_optional(self.pool)
        .await
        .map_err(DbError::database)?;

        let row = row.ok_or(DbError::NotFound {
            entity_type: "Project".to_string(),
            id: uid.to_string(),
        })?;

        project_from_row(&row)
    }

    async fn list_paginated(&self, page: &PageSort) -> DbResult<ListResult<Project>> {
        let (after_clause, binds) = build_after_clause(page);
        let limit_clause = build_limit_clause(page);

        // uid breaks created_at ties so the order is total
        let sql = format!(
            "SELECT uid, name, repo_url, created_at, updated_at FROM project{} \
             ORDER BY created_at ASC, uid ASC{}",
            after_clause, limit_clause
        );

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value.as_str());
        }
        let rows = query
            .fetch_all(self.pool)
            .await
            .map_err(DbError::database)?;

        let items = rows
            .iter()
            .map(project_from_row)
            .collect::<DbResult<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project")
            .fetch_one(self.pool)
            .await
            .map_err(DbError::database)?;

        Ok(ListResult {
            next: items.last().map(PageCursor::of),
            items,
            total: total as usize,
            limit: page.limit,
        })
    }

    async fn delete(&self, uid: &Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM project WHERE uid = ?")
            .bind(uid.to_string())
            .execute(self.pool)
            .await
            .map_err(DbError::database)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Project".to_string(),
                id: uid.to_string(),
            });
        }

        Ok(())
    }
}
