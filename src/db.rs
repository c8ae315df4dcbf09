use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;

use crate::{auth::error::StoreError, config::DbConfig};

pub async fn connect(database_url: &str, cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.timeout())
        .connect(database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Returns `true` when `err` is a unique-constraint violation (SQLSTATE `23505`).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Runs a query future under `limit`. Unique violations become
/// [`StoreError::DuplicateUsername`]; timeouts and other driver errors become
/// [`StoreError::Unavailable`].
pub async fn timed<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) if is_unique_violation(&e) => Err(StoreError::DuplicateUsername),
        Ok(Err(e)) => {
            warn!(error = %e, op, "database call failed");
            Err(StoreError::Unavailable(format!("{op}: {e}")))
        }
        Err(_) => {
            warn!(op, timeout_ms = limit.as_millis() as u64, "database call timed out");
            Err(StoreError::Unavailable(format!("{op}: timed out")))
        }
    }
}
