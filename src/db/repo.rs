use super::model::Warn;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

/// Open a group's warning store and bring its schema up to date. An empty
/// file, as left by record creation, is a valid empty database.
#[instrument(skip_all, fields(db = %path.display()))]
pub async fn open(path: &Path) -> Result<Pool> {
    // Default rollback journal: the store stays a single file at rest.
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open warning store {}", path.display()))?;
    run_migrations(&pool).await?;
    debug!("warning store ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Record a warning and return the user's warning count including it.
#[instrument(skip_all)]
pub async fn add_warn(pool: &Pool, user_id: i64, reason: Option<&str>) -> Result<i64> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO warnings (user_id, reason, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warnings WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn warn_count(pool: &Pool, user_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warnings WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Warnings for a user, oldest first.
#[instrument(skip_all)]
pub async fn list_warns(pool: &Pool, user_id: i64) -> Result<Vec<Warn>> {
    let rows = sqlx::query(
        "SELECT id, user_id, reason, created_at FROM warnings WHERE user_id = ? ORDER BY id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    let warns = rows
        .into_iter()
        .map(|row| Warn {
            id: row.get("id"),
            user_id: row.get("user_id"),
            reason: row.get("reason"),
            created_at: row.get("created_at"),
        })
        .collect();
    Ok(warns)
}

/// Drop the user's most recent warning. Returns false if there was none.
#[instrument(skip_all)]
pub async fn remove_last_warn(pool: &Pool, user_id: i64) -> Result<bool> {
    let res = sqlx::query(
        "DELETE FROM warnings WHERE id = (SELECT MAX(id) FROM warnings WHERE user_id = ?)",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Clear all of a user's warnings, returning how many were removed.
#[instrument(skip_all)]
pub async fn reset_warns(pool: &Pool, user_id: i64) -> Result<u64> {
    let res = sqlx::query("DELETE FROM warnings WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
