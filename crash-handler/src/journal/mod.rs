//! # Crash Journal
//!
//! A small text table of recent crashers, used by downstream policy to
//! spot software stuck in a crash loop:
//!
//! ```text
//! start=2026-10-16-08:00:00
//! total=7
//! 412 /usr/bin/app 3 2026-10-16-09:12:44 2026-10-16-09:12:31 2026-10-16-09:10:02
//! 377 /usr/sbin/daemon 4 2026-10-16-08:30:10
//! ```
//!
//! ## Bounds
//!
//! - At most [`MAX_RECORDS`] records; a new name on a full table evicts the
//!   record whose newest crash is the oldest.
//! - At most [`MAX_LAST_CRASH`] timestamps per record, newest first.
//!
//! ## Matching
//!
//! Records are keyed by **name only**. The pid is stored for information,
//! so a restarted process (new pid, same name) keeps counting up.
//!
//! ## Failure Model
//!
//! The journal is advisory. Any unreadable or malformed file loads as an
//! empty journal anchored at the current time; a failed save is logged.
//! Concurrent handlers can race on load-modify-save and lose an update;
//! there is no locking.

use chrono::{Local, NaiveDateTime, Timelike};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use crate::domain::{JournalError, Pid};

pub const MAX_RECORDS: usize = 20;
pub const MAX_LAST_CRASH: usize = 3;
/// Longest stored name, in bytes
pub const MAX_NAME_LEN: usize = 63;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

const JOURNAL_MODE: u32 = 0o660;

/// Current local time, whole seconds
#[must_use]
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn parse_timestamp(value: &str, line: usize) -> Result<NaiveDateTime, JournalError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|_| JournalError::BadTimestamp { line, value: value.to_string() })
}

/// Name as stored: no whitespace (the format is space separated), bounded
#[must_use]
pub fn journal_name(name: &str) -> String {
    let mut cleaned: String =
        name.chars().map(|c| if c.is_whitespace() { '_' } else { c }).collect();
    if cleaned.len() > MAX_NAME_LEN {
        let mut cut = MAX_NAME_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
    }
    if cleaned.is_empty() {
        cleaned.push('?');
    }
    cleaned
}

/// Crash history of one process name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Pid of the latest crash that created this record; not part of the key
    pub pid: i32,
    pub name: String,
    pub count: u32,
    /// Newest first, at most [`MAX_LAST_CRASH`]
    pub last_crash: Vec<NaiveDateTime>,
}

impl JournalRecord {
    fn new(pid: Pid, name: String, at: NaiveDateTime) -> Self {
        Self { pid: pid.0, name, count: 1, last_crash: vec![at] }
    }

    /// Newest crash, `None` counts as infinitely old
    #[must_use]
    pub fn newest(&self) -> Option<NaiveDateTime> {
        self.last_crash.first().copied()
    }

    fn push_crash(&mut self, at: NaiveDateTime) {
        self.count = self.count.saturating_add(1);
        self.last_crash.insert(0, at);
        self.last_crash.truncate(MAX_LAST_CRASH);
    }

    fn parse(text: &str, line: usize) -> Result<Self, JournalError> {
        let mut fields = text.split_whitespace();
        let pid = fields.next().ok_or(JournalError::MissingField { line, field: "pid" })?;
        let pid = pid
            .parse()
            .map_err(|_| JournalError::BadNumber { line, value: pid.to_string() })?;
        let name = fields.next().ok_or(JournalError::MissingField { line, field: "name" })?;
        let count = fields.next().ok_or(JournalError::MissingField { line, field: "count" })?;
        let count = count
            .parse()
            .map_err(|_| JournalError::BadNumber { line, value: count.to_string() })?;
        let mut last_crash = fields
            .take(MAX_LAST_CRASH)
            .map(|ts| parse_timestamp(ts, line))
            .collect::<Result<Vec<_>, _>>()?;
        // Newest first, whatever order a hand-edited file uses
        last_crash.sort_unstable_by(|a, b| b.cmp(a));
        Ok(Self { pid, name: journal_name(name), count, last_crash })
    }
}

/// The whole journal: header plus bounded record table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    pub start_time: NaiveDateTime,
    pub total_count: u64,
    /// Most recently inserted first, at most [`MAX_RECORDS`]
    pub records: Vec<JournalRecord>,
}

impl Journal {
    #[must_use]
    pub fn empty(start_time: NaiveDateTime) -> Self {
        Self { start_time, total_count: 0, records: Vec::new() }
    }

    /// Parse the text format.
    ///
    /// # Errors
    /// Returns the first structural problem found: missing header lines,
    /// missing record fields, bad numbers or timestamps.
    pub fn parse(text: &str) -> Result<Self, JournalError> {
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

        let (line, start) = lines.next().ok_or(JournalError::Empty)?;
        let start = start
            .trim()
            .strip_prefix("start=")
            .ok_or(JournalError::MissingField { line, field: "start" })?;
        let start_time = parse_timestamp(start, line)?;

        let (line, total) =
            lines.next().ok_or(JournalError::MissingField { line: 2, field: "total" })?;
        let total = total
            .trim()
            .strip_prefix("total=")
            .ok_or(JournalError::MissingField { line, field: "total" })?;
        let total_count = total
            .parse()
            .map_err(|_| JournalError::BadNumber { line, value: total.to_string() })?;

        let records = lines
            .filter(|(_, text)| !text.trim().is_empty())
            .take(MAX_RECORDS)
            .map(|(line, text)| JournalRecord::parse(text, line))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { start_time, total_count, records })
    }

    /// Serialize to the text format
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "start={}", self.start_time.format(TIMESTAMP_FORMAT));
        let _ = writeln!(out, "total={}", self.total_count);
        for record in &self.records {
            let _ = write!(out, "{} {} {}", record.pid, record.name, record.count);
            for ts in &record.last_crash {
                let _ = write!(out, " {}", ts.format(TIMESTAMP_FORMAT));
            }
            out.push('\n');
        }
        out
    }

    /// Record matching `name`; the pid is deliberately not compared
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&JournalRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    /// Index of the record whose newest crash is oldest overall.
    ///
    /// Records with no timestamps count as infinitely old; ties go to the
    /// lowest index. `None` only for an empty journal.
    #[must_use]
    pub fn eviction_candidate(&self) -> Option<usize> {
        self.records
            .iter()
            .enumerate()
            .min_by_key(|(_, record)| record.newest())
            .map(|(index, _)| index)
    }

    /// Count one crash of `name` at time `at`
    pub fn record_at(&mut self, pid: Pid, name: &str, at: NaiveDateTime) {
        let name = journal_name(name);
        self.total_count = self.total_count.saturating_add(1);

        if let Some(record) = self.records.iter_mut().find(|record| record.name == name) {
            record.push_crash(at);
            debug!("{name}: crash #{} recorded", record.count);
            return;
        }

        let record = JournalRecord::new(pid, name, at);
        if self.records.len() < MAX_RECORDS {
            self.records.insert(0, record);
        } else if let Some(index) = self.eviction_candidate() {
            debug!("journal full, evicting {}", self.records[index].name);
            self.records[index] = record;
        }
    }
}

/// Explicit handle on the journal file
#[derive(Debug, Clone)]
pub struct CrashJournal {
    path: PathBuf,
}

impl CrashJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the journal; never fails, a missing or corrupt file resets it
    #[must_use]
    pub fn load(&self) -> Journal {
        self.load_at(now())
    }

    #[must_use]
    pub fn load_at(&self, now: NaiveDateTime) -> Journal {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!("problem opening {}: {e}", self.path.display());
                return Journal::empty(now);
            }
        };
        match Journal::parse(&text) {
            Ok(journal) => journal,
            Err(e) => {
                warn!("resetting crash journal {}: {e}", self.path.display());
                Journal::empty(now)
            }
        }
    }

    /// Write the journal, truncating the previous contents
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, journal: &Journal) -> Result<(), JournalError> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(JOURNAL_MODE)
            .open(&self.path)?;
        file.write_all(journal.render().as_bytes())?;
        Ok(())
    }

    /// Load, count one crash of `name`, save. Returns the updated journal.
    pub fn record(&self, pid: Pid, name: &str) -> Journal {
        self.record_at(pid, name, now())
    }

    pub fn record_at(&self, pid: Pid, name: &str, at: NaiveDateTime) -> Journal {
        let mut journal = self.load_at(at);
        journal.record_at(pid, name, at);
        match self.save(&journal) {
            Ok(()) => info!(
                "crash journal {}: {} total, {} records",
                self.path.display(),
                journal.total_count,
                journal.records.len()
            ),
            Err(e) => warn!("problem writing crash journal {}: {e}", self.path.display()),
        }
        journal
    }
}
