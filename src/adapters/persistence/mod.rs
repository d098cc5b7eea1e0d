pub mod audit;
pub mod token;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::application::app_error::{AppError, AppResult};

/// Postgres-backed implementation of the store traits.
///
/// Row locks come from `SELECT ... FOR UPDATE`, so mutations of one token
/// serialize while unrelated tokens proceed in parallel. Lock waits honor
/// the connection's `lock_timeout`; when it elapses Postgres raises
/// `55P03`, surfaced here as the retryable `LockTimeout`.
#[derive(Clone)]
pub struct PostgresPersistence {
    pub pool: PgPool,
}

impl PostgresPersistence {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(map_db_err)?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        // lock_not_available: lock_timeout elapsed while waiting on a row
        if db.code().as_deref() == Some("55P03") {
            return AppError::LockTimeout;
        }
    }
    AppError::Database(err.to_string())
}
