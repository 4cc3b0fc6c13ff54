//! Group preference records.
//!
//! A record is a small INI file at `GroupPrefs/<id>.grprf`:
//!
//! ```text
//! [WARNINGS]
//! MAX_WARN = 4
//! WARN_DB_PATH = GroupPrefs/DB/<id>db.db
//!
//! [GROUP_NAMES]
//! NAME = <id>
//!
//! [FILTERS]
//! LOCK_FORWARD = 1
//! LOCK_LINK = 1
//! ```
//!
//! Handles never cache across calls: every accessor re-reads the file first and
//! every mutator re-reads, applies its change, and writes the whole file back.
//! Two handles to the same group therefore see each other's writes on their
//! next call, and never otherwise.
use crate::bootstrap::Layout;
use crate::ini::{Ini, IniError};
use crate::model::{Filter, InvalidRecordId, PrefsSnapshot, RecordId, SetOutcome};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const WARNINGS: &str = "WARNINGS";
const GROUP_NAMES: &str = "GROUP_NAMES";
const FILTERS: &str = "FILTERS";
const MAX_WARN: &str = "MAX_WARN";
const WARN_DB_PATH: &str = "WARN_DB_PATH";
// Older records stored the warning store path under this key.
const LEGACY_WARN_DB: &str = "WARN_DB";
const NAME: &str = "NAME";

const TEMP_FILE_SUFFIX: &str = ".tmp";

pub const DEFAULT_MAX_WARN: u32 = 4;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error(transparent)]
    InvalidId(#[from] InvalidRecordId),
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed record {path}: {source}")]
    Parse { path: PathBuf, source: IniError },
    #[error("record {path}: missing [{section}] {key}")]
    Missing {
        path: PathBuf,
        section: &'static str,
        key: &'static str,
    },
    #[error("record {path}: [{section}] {key} has invalid value {value:?}")]
    Malformed {
        path: PathBuf,
        section: &'static str,
        key: String,
        value: String,
    },
    #[error("created warning store {db} but failed to write record {path}: {source}")]
    PartialCreate {
        path: PathBuf,
        db: PathBuf,
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PrefsError + '_ {
    move |source| PrefsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Handle to one group's preference record.
#[derive(Debug)]
pub struct PreferenceRecord {
    id: RecordId,
    layout: Layout,
    path: PathBuf,
    doc: Ini,
}

impl PreferenceRecord {
    /// Open the record for `group_id`, creating it with defaults (and its
    /// warning store) if it does not exist yet.
    pub fn open_or_create(layout: &Layout, group_id: &str) -> Result<Self, PrefsError> {
        let id = RecordId::parse(group_id)?;
        Self::open_or_create_id(layout, id)
    }

    #[instrument(skip_all, fields(group = %id))]
    pub fn open_or_create_id(layout: &Layout, id: RecordId) -> Result<Self, PrefsError> {
        let path = layout.prefs_dir().join(id.file_name());
        if path.is_file() {
            let doc = read_doc(&path)?;
            debug!(path = %path.display(), "opened group record");
            return Ok(Self {
                id,
                layout: layout.clone(),
                path,
                doc,
            });
        }
        Self::create(layout, id, path)
    }

    fn create(layout: &Layout, id: RecordId, path: PathBuf) -> Result<Self, PrefsError> {
        let db_rel = id.warn_db_path();
        let db_file = layout.resolve(&db_rel);

        // Phase 1: the warning store. Phase 2: the record, via temp + rename.
        let created_db = create_warn_store(&db_file)?;

        let mut doc = Ini::new();
        doc.set(WARNINGS, MAX_WARN, DEFAULT_MAX_WARN.to_string());
        doc.set(WARNINGS, WARN_DB_PATH, db_rel);
        doc.set(GROUP_NAMES, NAME, id.as_str());
        doc.set(FILTERS, Filter::LockForward.as_str(), "1");
        doc.set(FILTERS, Filter::LockLink.as_str(), "1");

        if let Err(source) = write_atomic(&path, &doc.to_string()) {
            if created_db {
                if let Err(err) = fs::remove_file(&db_file) {
                    warn!(?err, db = %db_file.display(), "failed to remove orphaned warning store");
                }
            }
            return Err(PrefsError::PartialCreate {
                path,
                db: db_file,
                source,
            });
        }

        info!(path = %path.display(), "created group record");
        Ok(Self {
            id,
            layout: layout.clone(),
            path,
            doc,
        })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory state with what is on disk.
    pub fn reload(&mut self) -> Result<(), PrefsError> {
        self.doc = read_doc(&self.path)?;
        Ok(())
    }

    pub fn group_name(&mut self) -> Result<String, PrefsError> {
        self.reload()?;
        self.read_name()
    }

    /// Root-relative path of this group's warning store.
    pub fn warn_db_path(&mut self) -> Result<String, PrefsError> {
        self.reload()?;
        self.read_warn_db_path()
    }

    /// Warning store path resolved against the storage root.
    pub fn warn_db_file(&mut self) -> Result<PathBuf, PrefsError> {
        let rel = self.warn_db_path()?;
        Ok(self.layout.resolve(&rel))
    }

    pub fn max_warn(&mut self) -> Result<u32, PrefsError> {
        self.reload()?;
        self.read_max_warn()
    }

    /// `None` when the filter key is absent from the record.
    pub fn filter(&mut self, filter: Filter) -> Result<Option<bool>, PrefsError> {
        self.reload()?;
        self.read_filter(filter)
    }

    /// Like [`filter`](Self::filter) but by stored key name; unknown names
    /// yield `None` without touching the disk.
    pub fn filter_by_name(&mut self, name: &str) -> Result<Option<bool>, PrefsError> {
        match Filter::from_name(name) {
            Some(filter) => self.filter(filter),
            None => Ok(None),
        }
    }

    /// Set the warning limit. `value` is formatted and must read back as a
    /// positive integer, otherwise nothing is written and `Rejected` is returned.
    pub fn set_max_warn(&mut self, value: impl fmt::Display) -> Result<SetOutcome, PrefsError> {
        let raw = value.to_string();
        let Some(max_warn) = parse_max_warn(&raw) else {
            debug!(group = %self.id, value = %raw, "rejected max_warn");
            return Ok(SetOutcome::Rejected);
        };
        self.reload()?;
        self.doc.set(WARNINGS, MAX_WARN, max_warn.to_string());
        self.persist()?;
        info!(group = %self.id, max_warn, "updated max_warn");
        Ok(SetOutcome::Applied)
    }

    pub fn set_filter(&mut self, filter: Filter, enabled: bool) -> Result<(), PrefsError> {
        self.reload()?;
        self.doc
            .set(FILTERS, filter.as_str(), if enabled { "1" } else { "0" });
        self.persist()?;
        self.reload()?;
        info!(group = %self.id, filter = filter.as_str(), enabled, "updated filter");
        Ok(())
    }

    /// Stored-key-name variant of [`set_filter`](Self::set_filter); unknown
    /// names are reported as `UnknownFilter` and nothing is written.
    pub fn set_filter_by_name(&mut self, name: &str, enabled: bool) -> Result<SetOutcome, PrefsError> {
        let Some(filter) = Filter::from_name(name) else {
            debug!(group = %self.id, name, "ignored unknown filter");
            return Ok(SetOutcome::UnknownFilter);
        };
        self.set_filter(filter, enabled)?;
        Ok(SetOutcome::Applied)
    }

    /// All fields from a single fresh read.
    pub fn snapshot(&mut self) -> Result<PrefsSnapshot, PrefsError> {
        self.reload()?;
        let mut filters = BTreeMap::new();
        for filter in Filter::ALL {
            if let Some(enabled) = self.read_filter(filter)? {
                filters.insert(filter.as_str().to_string(), enabled);
            }
        }
        Ok(PrefsSnapshot {
            group_id: self.id.clone(),
            name: self.read_name()?,
            max_warn: self.read_max_warn()?,
            warn_db_path: self.read_warn_db_path()?,
            filters,
        })
    }

    fn persist(&self) -> Result<(), PrefsError> {
        write_atomic(&self.path, &self.doc.to_string()).map_err(io_err(&self.path))?;
        debug!(path = %self.path.display(), "persisted group record");
        Ok(())
    }

    fn required(&self, section: &'static str, key: &'static str) -> Result<&str, PrefsError> {
        self.doc.get(section, key).ok_or_else(|| PrefsError::Missing {
            path: self.path.clone(),
            section,
            key,
        })
    }

    fn malformed(&self, section: &'static str, key: &str, value: &str) -> PrefsError {
        PrefsError::Malformed {
            path: self.path.clone(),
            section,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn read_name(&self) -> Result<String, PrefsError> {
        self.required(GROUP_NAMES, NAME).map(str::to_string)
    }

    fn read_warn_db_path(&self) -> Result<String, PrefsError> {
        if let Some(path) = self.doc.get(WARNINGS, LEGACY_WARN_DB) {
            if self.doc.get(WARNINGS, WARN_DB_PATH).is_none() {
                return Ok(path.to_string());
            }
        }
        self.required(WARNINGS, WARN_DB_PATH).map(str::to_string)
    }

    fn read_max_warn(&self) -> Result<u32, PrefsError> {
        let raw = self.required(WARNINGS, MAX_WARN)?;
        parse_max_warn(raw).ok_or_else(|| self.malformed(WARNINGS, MAX_WARN, raw))
    }

    fn read_filter(&self, filter: Filter) -> Result<Option<bool>, PrefsError> {
        let Some(raw) = self.doc.get(FILTERS, filter.as_str()) else {
            return Ok(None);
        };
        parse_flag(raw)
            .map(Some)
            .ok_or_else(|| self.malformed(FILTERS, filter.as_str(), raw))
    }
}

fn parse_max_warn(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_doc(path: &Path) -> Result<Ini, PrefsError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    Ini::parse(&content).map_err(|source| PrefsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Create an empty warning store. Returns `false` when a store left behind by
/// an interrupted creation already exists; it is adopted as-is.
fn create_warn_store(path: &Path) -> Result<bool, PrefsError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            warn!(db = %path.display(), "adopting existing warning store");
            Ok(false)
        }
        Err(err) => Err(io_err(path)(err)),
    }
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TEMP_FILE_SUFFIX);
    let tmp = PathBuf::from(tmp);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layout() -> (tempfile::TempDir, Layout) {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        layout.ensure().unwrap();
        (td, layout)
    }

    #[test]
    fn create_writes_defaults_and_store() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "-100777").unwrap();
        assert_eq!(rec.path(), layout.prefs_dir().join("-100777.grprf"));
        assert_eq!(rec.max_warn().unwrap(), DEFAULT_MAX_WARN);
        assert_eq!(rec.group_name().unwrap(), "-100777");
        assert_eq!(rec.warn_db_path().unwrap(), "GroupPrefs/DB/-100777db.db");
        assert_eq!(rec.filter(Filter::LockLink).unwrap(), Some(true));
        assert_eq!(rec.filter(Filter::LockForward).unwrap(), Some(true));

        let db = layout.db_dir().join("-100777db.db");
        assert!(db.is_file());
        assert_eq!(fs::metadata(&db).unwrap().len(), 0);
        assert_eq!(rec.warn_db_file().unwrap(), db);
    }

    #[test]
    fn suffix_is_normalized() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "chat.grprf").unwrap();
        assert_eq!(rec.id().as_str(), "chat");
        assert_eq!(rec.group_name().unwrap(), "chat");
        assert!(layout.prefs_dir().join("chat.grprf").is_file());
        assert!(!layout.prefs_dir().join("chat.grprf.grprf").exists());
    }

    #[test]
    fn existing_record_is_opened_not_overwritten() {
        let (_td, layout) = layout();
        let path = layout.prefs_dir().join("g.grprf");
        fs::write(
            &path,
            "[WARNINGS]\nMAX_WARN = 9\nWARN_DB_PATH = GroupPrefs/DB/gdb.db\n[GROUP_NAMES]\nNAME = Gophers\n[FILTERS]\nLOCK_FORWARD = 0\nLOCK_LINK = 1\n",
        )
        .unwrap();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        assert_eq!(rec.max_warn().unwrap(), 9);
        assert_eq!(rec.group_name().unwrap(), "Gophers");
        assert_eq!(rec.filter(Filter::LockForward).unwrap(), Some(false));
        assert!(!layout.db_dir().join("gdb.db").exists());
    }

    #[test]
    fn legacy_warn_db_key_is_read() {
        let (_td, layout) = layout();
        fs::write(
            layout.prefs_dir().join("old.grprf"),
            "[WARNINGS]\nmax_warn = 4\nwarn_db = GroupPrefs/DB/olddb.db\n[GROUP_NAMES]\nname = old\n[FILTERS]\nlock_forward = 1\nlock_link = 1\n",
        )
        .unwrap();
        let mut rec = PreferenceRecord::open_or_create(&layout, "old").unwrap();
        assert_eq!(rec.warn_db_path().unwrap(), "GroupPrefs/DB/olddb.db");
        assert_eq!(rec.filter(Filter::LockLink).unwrap(), Some(true));
    }

    #[test]
    fn set_max_warn_validates_and_persists() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        for bad in ["abc", "", "0", "-3", "2.5"] {
            assert_eq!(rec.set_max_warn(bad).unwrap(), SetOutcome::Rejected, "{bad:?}");
        }
        assert_eq!(rec.max_warn().unwrap(), 4);

        assert_eq!(rec.set_max_warn(7u32).unwrap(), SetOutcome::Applied);
        assert_eq!(rec.set_max_warn(" 6 ").unwrap(), SetOutcome::Applied);
        let mut other = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        assert_eq!(other.max_warn().unwrap(), 6);
    }

    #[test]
    fn malformed_max_warn_on_disk() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        let text = fs::read_to_string(rec.path()).unwrap().replace("MAX_WARN = 4", "MAX_WARN = lots");
        fs::write(rec.path(), text).unwrap();
        assert!(matches!(rec.max_warn(), Err(PrefsError::Malformed { .. })));
    }

    #[test]
    fn unknown_filter_is_reported_not_written() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        let before = fs::read_to_string(rec.path()).unwrap();
        assert_eq!(
            rec.set_filter_by_name("NONEXISTENT", true).unwrap(),
            SetOutcome::UnknownFilter
        );
        assert_eq!(rec.filter_by_name("NONEXISTENT").unwrap(), None);
        assert_eq!(fs::read_to_string(rec.path()).unwrap(), before);
    }

    #[test]
    fn set_filter_by_name_is_case_insensitive() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        assert!(rec.set_filter_by_name("lock_link", false).unwrap().is_applied());
        assert_eq!(rec.filter_by_name("LOCK_LINK").unwrap(), Some(false));
        let text = fs::read_to_string(rec.path()).unwrap();
        assert!(text.contains("LOCK_LINK = 0"));
    }

    #[test]
    fn missing_filter_key_reads_none_and_set_adds_it() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        let text = fs::read_to_string(rec.path()).unwrap().replace("LOCK_LINK = 1\n", "");
        fs::write(rec.path(), text).unwrap();
        assert_eq!(rec.filter(Filter::LockLink).unwrap(), None);
        rec.set_filter(Filter::LockLink, true).unwrap();
        assert_eq!(rec.filter(Filter::LockLink).unwrap(), Some(true));
    }

    #[test]
    fn failed_record_write_removes_new_store() {
        let (_td, layout) = layout();
        // A directory squatting on the record path makes the final rename fail.
        fs::create_dir(layout.prefs_dir().join("g.grprf")).unwrap();
        fs::write(layout.prefs_dir().join("g.grprf").join("x"), "").unwrap();
        let err = PreferenceRecord::open_or_create(&layout, "g").unwrap_err();
        assert!(matches!(err, PrefsError::PartialCreate { .. }));
        assert!(!layout.db_dir().join("gdb.db").exists());
        assert!(!layout.prefs_dir().join("g.grprf.tmp").exists());
    }

    #[test]
    fn stray_store_is_adopted() {
        let (_td, layout) = layout();
        let db = layout.db_dir().join("gdb.db");
        fs::write(&db, b"keep me").unwrap();
        PreferenceRecord::open_or_create(&layout, "g").unwrap();
        assert_eq!(fs::read(&db).unwrap(), b"keep me");
    }

    #[test]
    fn missing_db_dir_fails_creation() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        fs::create_dir(layout.prefs_dir()).unwrap();
        let err = PreferenceRecord::open_or_create(&layout, "g").unwrap_err();
        assert!(matches!(err, PrefsError::Io { .. }));
        assert!(!layout.prefs_dir().join("g.grprf").exists());
    }

    #[test]
    fn group_name_keeps_padding_and_quotes() {
        let (_td, layout) = layout();
        for raw in [" g ", "\"q\"", "'s'"] {
            PreferenceRecord::open_or_create(&layout, raw).unwrap();
            let mut reopened = PreferenceRecord::open_or_create(&layout, raw).unwrap();
            assert_eq!(reopened.group_name().unwrap(), raw);
        }
    }

    #[test]
    fn write_atomic_replaces_contents_without_leftovers() {
        let td = tempdir().unwrap();
        let path = td.path().join("r.grprf");
        write_atomic(&path, "[A]\nk = 1\n").unwrap();
        write_atomic(&path, "[A]\nk = 2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[A]\nk = 2\n");
        assert!(!td.path().join("r.grprf.tmp").exists());
    }

    #[test]
    fn snapshot_collects_all_fields() {
        let (_td, layout) = layout();
        let mut rec = PreferenceRecord::open_or_create(&layout, "g").unwrap();
        rec.set_filter(Filter::LockForward, false).unwrap();
        let snap = rec.snapshot().unwrap();
        assert_eq!(snap.group_id.as_str(), "g");
        assert_eq!(snap.max_warn, 4);
        assert_eq!(snap.warn_db_path, "GroupPrefs/DB/gdb.db");
        assert_eq!(snap.filters.get("LOCK_FORWARD"), Some(&false));
        assert_eq!(snap.filters.get("LOCK_LINK"), Some(&true));
    }
}
