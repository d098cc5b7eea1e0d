use async_trait::async_trait;
use sqlx::Row;

use crate::adapters::persistence::{PostgresPersistence, map_db_err};
use crate::application::app_error::{AppError, AppResult};
use crate::application::audit::AuditLogRepo;
use crate::domain::entities::AuditLogEntry;

fn row_to_entry(row: sqlx::postgres::PgRow) -> AppResult<AuditLogEntry> {
    let action: String = row.get("action");
    Ok(AuditLogEntry {
        id: row.get("id"),
        token_id: row.get("token_id"),
        action: action
            .parse()
            .map_err(|_| AppError::Database(format!("unknown audit action {action:?}")))?,
        path: row.get("path"),
        method: row.get("method"),
        status_code: row.get::<i32, _>("status_code") as u16,
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        extra: row.get("extra"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl AuditLogRepo for PostgresPersistence {
    async fn insert_entry(&self, entry: &AuditLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tokengate_audit_log
                (id, token_id, action, path, method, status_code,
                 ip_address, user_agent, extra, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.token_id)
        .bind(entry.action.to_string())
        .bind(&entry.path)
        .bind(&entry.method)
        .bind(entry.status_code as i32)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.extra)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, token_id, action, path, method, status_code,
                   ip_address, user_agent, extra, created_at
            FROM tokengate_audit_log
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(row_to_entry).collect()
    }
}
