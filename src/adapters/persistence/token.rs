use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::adapters::persistence::{PostgresPersistence, map_db_err};
use crate::application::app_error::{AppError, AppResult};
use crate::application::use_cases::tokens::{TokenRepo, TokenTx};
use crate::domain::entities::Token;

const TOKEN_COLUMNS: &str = "id, name, description, token_type, created_by, owner, scopes, \
     key, prefix, hint, created_at, expires_at, last_used_at, revoked, purged";

fn row_to_token(row: sqlx::postgres::PgRow) -> AppResult<Token> {
    let token_type: String = row.get("token_type");
    Ok(Token {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        token_type: token_type
            .parse()
            .map_err(|_| AppError::Database(format!("unknown token_type {token_type:?}")))?,
        created_by: row.get("created_by"),
        owner: row.get("owner"),
        scopes: row.get("scopes"),
        key: row.get("key"),
        prefix: row.get("prefix"),
        hint: row.get("hint"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        last_used_at: row.get("last_used_at"),
        revoked: row.get("revoked"),
        purged: row.get("purged"),
    })
}

pub struct PostgresTokenTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TokenRepo for PostgresPersistence {
    async fn begin(&self) -> AppResult<Box<dyn TokenTx>> {
        let tx = self.pool.begin().await.map_err(map_db_err)?;
        Ok(Box::new(PostgresTokenTx { tx }))
    }

    async fn prefix_exists(&self, prefix: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM tokengate_tokens WHERE prefix = $1)")
            .bind(prefix)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.get(0))
    }

    async fn insert(&self, token: &Token) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tokengate_tokens
                (id, name, description, token_type, created_by, owner, scopes,
                 key, prefix, hint, created_at, expires_at, last_used_at, revoked, purged)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(token.id)
        .bind(&token.name)
        .bind(&token.description)
        .bind(token.token_type.to_string())
        .bind(&token.created_by)
        .bind(&token.owner)
        .bind(&token.scopes)
        .bind(&token.key)
        .bind(&token.prefix)
        .bind(&token.hint)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.last_used_at)
        .bind(token.revoked)
        .bind(token.purged)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }
}

#[async_trait]
impl TokenTx for PostgresTokenTx {
    async fn find_by_prefix_for_update(&mut self, prefix: &str) -> AppResult<Option<Token>> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokengate_tokens WHERE prefix = $1 FOR UPDATE"
        ))
        .bind(prefix)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        row.map(row_to_token).transpose()
    }

    async fn find_by_id_for_update(&mut self, id: Uuid) -> AppResult<Option<Token>> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokengate_tokens WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        row.map(row_to_token).transpose()
    }

    async fn save(&mut self, token: &Token) -> AppResult<()> {
        // id, prefix, created_at and the identity columns are immutable;
        // only the fields the lifecycle mutates are written back.
        sqlx::query(
            r#"
            UPDATE tokengate_tokens
            SET key = $2, hint = $3, last_used_at = $4, expires_at = $5,
                revoked = $6, purged = $7, name = $8, description = $9, scopes = $10
            WHERE id = $1
            "#,
        )
        .bind(token.id)
        .bind(&token.key)
        .bind(&token.hint)
        .bind(token.last_used_at)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.purged)
        .bind(&token.name)
        .bind(&token.description)
        .bind(&token.scopes)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(map_db_err)
    }
}
