//! Applying warnings against a group's configured limit.
use crate::db::{self, Pool};
use crate::prefs::PreferenceRecord;
use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WarnOutcome {
    /// Warnings the user had once this one was counted.
    pub count: i64,
    pub limit: u32,
    /// The limit was hit; the user's warnings have been cleared and the caller
    /// should remove them from the group.
    pub limit_reached: bool,
}

/// Warn `user_id`, reading the limit from `record` at call time.
#[instrument(skip_all, fields(group = %record.id(), user_id = user_id))]
pub async fn warn_user(
    record: &mut PreferenceRecord,
    pool: &Pool,
    user_id: i64,
    reason: Option<&str>,
) -> Result<WarnOutcome> {
    let limit = record.max_warn()?;
    let count = db::add_warn(pool, user_id, reason).await?;
    let limit_reached = count >= i64::from(limit);
    if limit_reached {
        db::reset_warns(pool, user_id).await?;
        info!(count, limit, "warn limit reached");
    } else {
        info!(count, limit, "user warned");
    }
    Ok(WarnOutcome {
        count,
        limit,
        limit_reached,
    })
}

/// Open the warning store a record points at.
pub async fn open_store(record: &mut PreferenceRecord) -> Result<Pool> {
    let path = record.warn_db_file()?;
    db::open(&path).await
}
