//! Rotating report slot allocation

use log::{debug, info};
use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::domain::SlotError;

const REPORT_MODE: u32 = 0o600;
const DIR_MODE: u32 = 0o755;
const ROOT_ID: u32 = 0;

/// An allocated, open report file
#[derive(Debug)]
pub struct ReportSlot {
    pub index: usize,
    pub path: PathBuf,
    pub file: File,
}

/// `<dir>/<basename>_<NN>` for `NN` in `0..count`
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
    basename: String,
    count: usize,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>, basename: impl Into<String>, count: usize) -> Self {
        Self { dir: dir.into(), basename: basename.into(), count }
    }

    #[must_use]
    pub fn slot_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}_{index:02}", self.basename))
    }

    /// Path of a companion file sharing the slot number, e.g. `core_03`
    #[must_use]
    pub fn companion_path(&self, prefix: &str, index: usize) -> PathBuf {
        self.dir.join(format!("{prefix}_{index:02}"))
    }

    /// Open the slot for the next report.
    ///
    /// Prefers a name that does not exist yet, created with `O_EXCL` so a
    /// concurrent allocator cannot take the same one. If every slot exists,
    /// the one with the oldest modification time (lowest index on ties) is
    /// truncated and reused.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, no slots are
    /// configured, or the recycled slot cannot be opened.
    pub fn allocate(&self) -> Result<ReportSlot, SlotError> {
        if self.count == 0 {
            return Err(SlotError::NoSlots);
        }
        DirBuilder::new().recursive(true).mode(DIR_MODE).create(&self.dir).map_err(|source| {
            SlotError::CreateDir { dir: self.dir.display().to_string(), source }
        })?;

        // Single pass: take a free slot, or remember the oldest one
        let mut oldest: Option<(usize, SystemTime)> = None;
        for index in 0..self.count {
            let path = self.slot_path(index);
            match path.metadata() {
                Ok(meta) => {
                    let Ok(mtime) = meta.modified() else { continue };
                    if oldest.is_none_or(|(_, oldest_time)| mtime < oldest_time) {
                        oldest = Some((index, mtime));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    match open_report(&path, true) {
                        Ok(file) => {
                            info!("report slot {index}: {}", path.display());
                            return Ok(ReportSlot { index, path, file });
                        }
                        // Raced with another handler
                        Err(e) => debug!("slot {} taken: {e}", path.display()),
                    }
                }
                Err(e) => debug!("cannot stat {}: {e}", path.display()),
            }
        }

        let index = oldest.map_or(0, |(index, _)| index);
        let path = self.slot_path(index);
        let file = open_report(&path, false)
            .map_err(|source| SlotError::Open { path: path.display().to_string(), source })?;
        info!("recycling oldest report slot {index}: {}", path.display());
        Ok(ReportSlot { index, path, file })
    }
}

fn open_report(path: &Path, exclusive: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).mode(REPORT_MODE);
    if exclusive {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }
    let file = options.open(path)?;
    // Reports belong to root even when written on behalf of another user
    if let Err(e) = std::os::unix::fs::fchown(&file, Some(ROOT_ID), Some(ROOT_ID)) {
        debug!("fchown {}: {e}", path.display());
    }
    Ok(file)
}
