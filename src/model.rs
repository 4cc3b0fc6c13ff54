use crate::bootstrap::DB_DIR;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// File suffix of a group record inside `GroupPrefs/`.
pub const RECORD_SUFFIX: &str = ".grprf";
/// Extension of a group's warning store inside `GroupPrefs/DB/`.
pub const WARN_DB_EXT: &str = "db";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid group identifier {0:?}")]
pub struct InvalidRecordId(pub String);

/// Canonical group identifier. Every file belonging to a group is named after it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Normalize a raw group identifier, stripping one trailing `.grprf`.
    pub fn parse(raw: &str) -> Result<Self, InvalidRecordId> {
        let id = raw.strip_suffix(RECORD_SUFFIX).unwrap_or(raw);
        let bad = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\'])
            || id.chars().any(char::is_control);
        if bad {
            return Err(InvalidRecordId(raw.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// Recover an id from a directory entry name. `None` when the name does
    /// not carry the record suffix at all.
    pub fn from_file_name(name: &str) -> Option<Result<Self, InvalidRecordId>> {
        let stem = name.strip_suffix(RECORD_SUFFIX)?;
        Some(Self::parse(stem))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<id>.grprf`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, RECORD_SUFFIX)
    }

    /// `<id>db.db`
    pub fn warn_db_file_name(&self) -> String {
        format!("{}db.{}", self.0, WARN_DB_EXT)
    }

    /// Root-relative warning store path, as stored in the record.
    pub fn warn_db_path(&self) -> String {
        format!("{}/{}", DB_DIR, self.warn_db_file_name())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = InvalidRecordId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = InvalidRecordId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Content filters a group can toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Filter {
    LockForward,
    LockLink,
}

impl Filter {
    pub const ALL: [Filter; 2] = [Filter::LockForward, Filter::LockLink];

    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::LockForward => "LOCK_FORWARD",
            Filter::LockLink => "LOCK_LINK",
        }
    }

    /// Case-insensitive lookup by stored key name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a mutator that may decline to change anything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    /// The value failed validation; the record is unchanged.
    Rejected,
    /// The filter name is not one this bot knows; nothing was written.
    UnknownFilter,
}

impl SetOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetOutcome::Applied => "applied",
            SetOutcome::Rejected => "rejected",
            SetOutcome::UnknownFilter => "unknown_filter",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, SetOutcome::Applied)
    }
}

/// Point-in-time view of a record, for display and JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrefsSnapshot {
    pub group_id: RecordId,
    pub name: String,
    pub max_warn: u32,
    pub warn_db_path: String,
    pub filters: BTreeMap<String, bool>,
}
