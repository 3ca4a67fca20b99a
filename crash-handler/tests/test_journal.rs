use chrono::{Duration, NaiveDate, NaiveDateTime};
use crash_handler::domain::Pid;
use crash_handler::journal::{CrashJournal, Journal, MAX_RECORDS};
use std::fs;

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(9, 30, 0).unwrap()
}

#[test]
fn test_twice_in_one_second() {
    let dir = tempfile::tempdir().unwrap();
    let journal = CrashJournal::new(dir.path().join("crash_journal"));
    journal.record_at(Pid(100), "app", t0());
    let after = journal.record_at(Pid(100), "app", t0());

    assert_eq!(after.records.len(), 1);
    assert_eq!(after.records[0].count, 2);
    assert_eq!(after.records[0].last_crash, vec![t0(), t0()]);
}

#[test]
fn test_crash_ten_seconds_apart() {
    let dir = tempfile::tempdir().unwrap();
    let journal = CrashJournal::new(dir.path().join("crash_journal"));
    let t1 = t0() + Duration::seconds(10);
    journal.record_at(Pid(100), "app", t0());
    journal.record_at(Pid(100), "app", t1);

    let loaded = journal.load();
    assert_eq!(loaded.records.len(), 1);
    let record = &loaded.records[0];
    assert_eq!(record.name, "app");
    assert_eq!(record.count, 2);
    assert_eq!(record.last_crash, vec![t1, t0()]);
    assert_eq!(loaded.total_count, 2);
    // A fresh journal is anchored at the first crash
    assert_eq!(loaded.start_time, t0());
}

#[test]
fn test_full_journal_evicts_oldest_newest_crash() {
    let mut journal = Journal::empty(t0());
    for i in 0..MAX_RECORDS {
        let at = t0() + Duration::seconds(i64::try_from(i).unwrap() * 60);
        journal.record_at(Pid(i32::try_from(i).unwrap()), &format!("proc{i}"), at);
    }
    // proc0 crashed first but again recently; proc1 is now the stalest
    journal.record_at(Pid(0), "proc0", t0() + Duration::hours(2));
    assert_eq!(journal.records.len(), MAX_RECORDS);

    journal.record_at(Pid(999), "newcomer", t0() + Duration::hours(3));
    assert_eq!(journal.records.len(), MAX_RECORDS);
    assert!(journal.find("proc1").is_none());
    assert!(journal.find("proc0").is_some());
    assert_eq!(journal.find("newcomer").unwrap().count, 1);
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let journal = CrashJournal::new(dir.path().join("crash_journal"));
    let mut table = Journal::empty(t0());
    for (i, name) in ["a", "b", "c"].iter().enumerate() {
        for k in 0..=i {
            let secs = i64::try_from(i * 10 + k).unwrap();
            table.record_at(Pid(10), name, t0() + Duration::seconds(secs));
        }
    }
    journal.save(&table).unwrap();
    assert_eq!(journal.load(), table);
}

#[test]
fn test_corrupt_journal_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crash_journal");
    fs::write(&path, "start=2026-10-16-08:00:00\ntotal=many\n").unwrap();
    let journal = CrashJournal::new(&path);

    let after = journal.record_at(Pid(7), "app", t0());
    assert_eq!(after.total_count, 1);
    assert_eq!(after.start_time, t0());
    assert_eq!(after.records.len(), 1);
    assert!(fs::read_to_string(&path).unwrap().starts_with("start=2026-10-16-09:30:00\ntotal=1\n"));
}

#[test]
fn test_missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let journal = CrashJournal::new(dir.path().join("nope"));
    let loaded = journal.load_at(t0());
    assert_eq!(loaded, Journal::empty(t0()));
}
