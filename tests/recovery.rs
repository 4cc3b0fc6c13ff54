use grp_prefs::{Filter, Layout, PreferenceRecord, RecordStore};
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, Layout) {
    let td = tempfile::tempdir().unwrap();
    let layout = Layout::new(td.path());
    layout.ensure().unwrap();
    (td, layout)
}

#[test]
fn recovers_one_entry_per_record() {
    let (_td, layout) = setup();
    for id in ["A", "B", "C"] {
        PreferenceRecord::open_or_create(&layout, id).unwrap();
    }

    let recovered = RecordStore::new(layout).recover().unwrap();
    assert_eq!(recovered.len(), 3);
    let ids: BTreeSet<String> = recovered.iter().map(|(id, _)| id.to_string()).collect();
    assert_eq!(ids, BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string()]));
    for (id, rec) in &recovered {
        assert_eq!(rec.id(), id);
    }
}

#[test]
fn recovered_handles_carry_persisted_state() {
    let (_td, layout) = setup();
    let mut rec = PreferenceRecord::open_or_create(&layout, "-10042").unwrap();
    rec.set_filter(Filter::LockForward, false).unwrap();
    rec.set_max_warn(2).unwrap();

    let mut recovered = RecordStore::new(layout.clone()).recover().unwrap();
    assert_eq!(recovered.len(), 1);
    let (id, rec) = &mut recovered[0];
    assert_eq!(id.as_str(), "-10042");
    assert_eq!(rec.max_warn().unwrap(), 2);
    assert_eq!(rec.filter(Filter::LockForward).unwrap(), Some(false));
    // Recovery opens, it never creates.
    assert_eq!(fs::read_dir(layout.db_dir()).unwrap().count(), 1);
}

#[test]
fn unreadable_record_is_skipped() {
    let (_td, layout) = setup();
    PreferenceRecord::open_or_create(&layout, "good").unwrap();
    fs::write(layout.prefs_dir().join("bad.grprf"), "this is not a record\n").unwrap();

    let recovered = RecordStore::new(layout).recover().unwrap();
    let ids: Vec<String> = recovered.iter().map(|(id, _)| id.to_string()).collect();
    assert_eq!(ids, vec!["good".to_string()]);
}

#[test]
fn store_open_creates_missing_record() {
    let (_td, layout) = setup();
    let store = RecordStore::new(layout.clone());
    let id = "fresh".parse().unwrap();
    let mut rec = store.open(id).unwrap();
    assert_eq!(rec.group_name().unwrap(), "fresh");
    assert_eq!(store.ids().unwrap().len(), 1);
}
