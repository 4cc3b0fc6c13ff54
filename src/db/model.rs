//! Warning store rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One warning issued to a user in a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warn {
    pub id: i64,
    pub user_id: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
