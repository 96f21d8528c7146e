//! SQLite FontRepository implementation.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::helpers::{decode_timestamp, decode_uid, encode_timestamp, placeholders};
use crate::db::utils::current_timestamp;
use crate::db::{DbError, DbResult, Font, FontRepository};

/// SQLx-backed font repository.
pub struct SqliteFontRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

const FONT_COLUMNS: &str = "uid, project_uid, name, data, created_at, updated_at, exported_at";

fn font_from_row(row: &SqliteRow) -> DbResult<Font> {
    let uid: String = row.try_get("uid").map_err(DbError::database)?;
    let project_uid: String = row.try_get("project_uid").map_err(DbError::database)?;
    let data: String = row.try_get("data").map_err(DbError::database)?;
    let created_at: String = row.try_get("created_at").map_err(DbError::database)?;
    let updated_at: String = row.try_get("updated_at").map_err(DbError::database)?;
    let exported_at: Option<String> = row.try_get("exported_at").map_err(DbError::database)?;

    let data = serde_json::from_str(&data).map_err(|e| DbError::InvalidData {
        message: format!("font {} data is not valid JSON: {}", uid, e),
        help: "Re-save the font to rewrite its data".to_string(),
    })?;

    Ok(Font {
        uid: decode_uid(&uid)?,
        project_uid: decode_uid(&project_uid)?,
        name: row.try_get("name").map_err(DbError::database)?,
        data,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
        exported_at: exported_at.as_deref().map(decode_timestamp).transpose()?,
    })
}

impl<'a> FontRepository for SqliteFontRepository<'a> {
    async fn create(&self, font: &Font) -> DbResult<Font> {
        let uid = if font.uid.is_nil() {
            Uuid::new_v4()
        } else {
            font.uid
        };
        let created_at = current_timestamp();
        let data = serde_json::to_string(&font.data).map_err(DbError::database)?;

        sqlx::query(
            "INSERT INTO font (uid, project_uid, name, data, created_at, updated_at, exported_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(uid.to_string())
        .bind(font.project_uid.to_string())
        .bind(&font.name)
        .bind(&data)
        .bind(encode_timestamp(&created_at))
        .bind(encode_timestamp(&created_at))
        .execute(self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_foreign_key_violation() => DbError::NotFound {
                entity_type: "Project".to_string(),
                id: font.project_uid.to_string(),
            },
            Some(db_err) if db_err.is_unique_violation() => DbError::AlreadyExists {
                entity_type: "Font".to_string(),
                field: "uid".to_string(),
                value: uid.to_string(),
            },
            _ => DbError::database(e),
        })?;

        Ok(Font {
            uid,
            project_uid: font.project_uid,
            name: font.name.clone(),
            data: font.data.clone(),
            created_at,
            updated_at: created_at,
            exported_at: None,
        })
    }

    async fn get(&self, uid: &Uuid) -> DbResult<Font> {
        let sql = format!("SELECT {} FROM font WHERE uid = ?", FONT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(uid.to_string())
            .fetch_optional(self.pool)
            .await
            .map_err(DbError::database)?
            .ok_or(DbError::NotFound {
                entity_type: "Font".to_string(),
                id: uid.to_string(),
            })?;

        font_from_row(&row)
    }

    async fn update(&self, font: &Font) -> DbResult<Font> {
        let updated_at = current_timestamp();
        let data = serde_json::to_string(&font.data).map_err(DbError::database)?;

        let result = sqlx::query("UPDATE font SET name = ?, data = ?, updated_at = ? WHERE uid = ?")
            .bind(&font.name)
            .bind(&data)
            .bind(encode_timestamp(&updated_at))
            .bind(font.uid.to_string())
            .execute(self.pool)
            .await
            .map_err(DbError::database)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Font".to_string(),
                id: font.uid.to_string(),
            });
        }

        self.get(&font.uid).await
    }

    async fn list_by_project(&self, project_uid: &Uuid) -> DbResult<Vec<Font>> {
        self.list_for_projects(std::slice::from_ref(project_uid))
            .await
    }

    async fn list_for_projects(&self, project_uids: &[Uuid]) -> DbResult<Vec<Font>> {
        if project_uids.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            "SELECT {} FROM font WHERE project_uid IN ({}) ORDER BY project_uid, name, uid",
            FONT_COLUMNS,
            placeholders(project_uids.len())
        );

        let mut query = sqlx::query(&sql);
        for uid in project_uids {
            query = query.bind(uid.to_string());
        }

        let rows = query
            .fetch_all(self.pool)
            .await
            .map_err(DbError::database)?;

        rows.iter().map(font_from_row).collect()
    }

    async fn mark_exported(&self, font_uids: &[Uuid], at: DateTime<Utc>) -> DbResult<()> {
        if font_uids.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "UPDATE font SET exported_at = ? WHERE uid IN ({})",
            placeholders(font_uids.len())
        );

        let mut query = sqlx::query(&sql).bind(encode_timestamp(&at));
        for uid in font_uids {
            query = query.bind(uid.to_string());
        }

        query
            .execute(self.pool)
            .await
            .map_err(DbError::database)?;

        Ok(())
    }
}
