//! `/proc` text sources for the crashed task.
//!
//! Every reader here tolerates absence: a task that is already gone, or a
//! `/proc` that is not mounted, yields `None` (or `UNKNOWN` for identity).

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Pid;

/// Placeholder for identity fields that could not be read
pub const UNKNOWN: &str = "UNKNOWN";

/// Bytes of `cmdline`/`status` the handler is willing to look at
const MAX_PROC_TEXT: usize = 1024;

/// Identity of the crashed task as reported by `/proc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    /// First NUL-terminated argument of `cmdline`
    pub cmdline: String,
    /// `Name:` field of `status` (the kernel's `comm`)
    pub name: String,
}

impl Default for ProcInfo {
    fn default() -> Self {
        Self { cmdline: UNKNOWN.to_string(), name: UNKNOWN.to_string() }
    }
}

/// Handle on a procfs root, `/proc` unless a test points it elsewhere
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self { root: PathBuf::from("/proc") }
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, pid: Pid, file: &str) -> PathBuf {
        self.root.join(pid.0.to_string()).join(file)
    }

    /// Raw `cmdline` bytes, if readable
    #[must_use]
    pub fn cmdline(&self, pid: Pid) -> Option<Vec<u8>> {
        read_bounded(&self.path(pid, "cmdline"))
    }

    /// Raw `status` text, if readable
    #[must_use]
    pub fn status(&self, pid: Pid) -> Option<String> {
        read_bounded(&self.path(pid, "status")).map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    /// Full `maps` listing, if readable.
    ///
    /// Mapping names are arbitrary bytes; invalid UTF-8 is replaced so one
    /// odd path cannot cost the whole listing.
    #[must_use]
    pub fn maps(&self, pid: Pid) -> Option<String> {
        let path = self.path(pid, "maps");
        match fs::read(&path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                debug!("problem opening {}: {e}", path.display());
                None
            }
        }
    }

    /// Identity of `pid`, with `UNKNOWN` for anything missing
    #[must_use]
    pub fn proc_info(&self, pid: Pid) -> ProcInfo {
        let cmdline = self.cmdline(pid).and_then(|raw| first_argument(&raw));
        let name = self.status(pid).and_then(|text| status_name(&text));
        ProcInfo {
            cmdline: cmdline.unwrap_or_else(|| UNKNOWN.to_string()),
            name: name.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

fn read_bounded(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(mut bytes) => {
            bytes.truncate(MAX_PROC_TEXT);
            Some(bytes)
        }
        Err(e) => {
            debug!("problem opening {}: {e}", path.display());
            None
        }
    }
}

/// First NUL-terminated argument of a raw `cmdline`
fn first_argument(raw: &[u8]) -> Option<String> {
    let arg = raw.split(|&b| b == 0).next()?;
    if arg.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(arg).into_owned())
}

/// Value of the `Name:` line in `status`. Format: "Name:\t<name>"
fn status_name(status: &str) -> Option<String> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Name:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
