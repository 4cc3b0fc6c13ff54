//! Directory index over `GroupPrefs/`, used to recover every group at startup.
use crate::bootstrap::Layout;
use crate::model::{PrefsSnapshot, RecordId, RECORD_SUFFIX};
use crate::prefs::{PreferenceRecord, PrefsError};
use std::fs;
use std::io;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct RecordStore {
    layout: Layout,
}

impl RecordStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Ids of every record file in the directory, in enumeration order.
    pub fn ids(&self) -> Result<Vec<RecordId>, io::Error> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.layout.prefs_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                if name.to_string_lossy().ends_with(RECORD_SUFFIX) {
                    warn!(file = ?name, "skipping record file with a non UTF-8 name");
                }
                continue;
            };
            match RecordId::from_file_name(name) {
                Some(Ok(id)) => ids.push(id),
                Some(Err(err)) => warn!(file = name, %err, "skipping record file with an invalid name"),
                None => {}
            }
        }
        Ok(ids)
    }

    /// Open (or create) a single group's record.
    pub fn open(&self, id: RecordId) -> Result<PreferenceRecord, PrefsError> {
        PreferenceRecord::open_or_create_id(&self.layout, id)
    }

    /// Open a handle for every record on disk. A record that fails to open is
    /// logged and skipped so one bad file cannot block startup.
    #[instrument(skip_all)]
    pub fn recover(&self) -> Result<Vec<(RecordId, PreferenceRecord)>, io::Error> {
        let mut recovered = Vec::new();
        for id in self.ids()? {
            match self.open(id.clone()) {
                Ok(record) => recovered.push((id, record)),
                Err(err) => warn!(group = %id, %err, "skipping unreadable group record"),
            }
        }
        info!(count = recovered.len(), "recovered group records");
        Ok(recovered)
    }

    /// Snapshot every recoverable record; a record whose fields do not parse
    /// is logged and left out.
    pub fn snapshots(&self) -> Result<Vec<PrefsSnapshot>, io::Error> {
        let mut snaps = Vec::new();
        for (id, mut record) in self.recover()? {
            match record.snapshot() {
                Ok(snap) => snaps.push(snap),
                Err(err) => warn!(group = %id, %err, "skipping group record with invalid fields"),
            }
        }
        Ok(snaps)
    }
}
