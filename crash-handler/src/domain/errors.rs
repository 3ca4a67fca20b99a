//! Structured error types for the crash handler
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these cross the session boundary: `CrashSession` absorbs them
//! into report lines and log warnings.

use super::types::{Address, Pid};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("ptrace attach to pid {pid} failed: {source}")]
    AttachFailed { pid: Pid, source: std::io::Error },

    #[error("cannot get registers: {0}")]
    RegisterReadFailed(std::io::Error),

    #[error("register set of {0} bytes is not the 32-bit ARM layout")]
    UnsupportedRegisterLayout(usize),

    #[error("cannot get siginfo: {0}")]
    SigInfoFailed(std::io::Error),

    #[error("cannot read memory at {addr}: {source}")]
    MemoryReadFailed { addr: Address, source: std::io::Error },
}

impl TraceError {
    /// OS error code carried by the underlying failure, if any
    #[must_use]
    pub fn os_error(&self) -> Option<i32> {
        match self {
            TraceError::AttachFailed { source, .. }
            | TraceError::MemoryReadFailed { source, .. }
            | TraceError::RegisterReadFailed(source)
            | TraceError::SigInfoFailed(source) => source.raw_os_error(),
            TraceError::UnsupportedRegisterLayout(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("failed to create report directory {dir}: {source}")]
    CreateDir { dir: String, source: std::io::Error },

    #[error("failed to open report slot {path}: {source}")]
    Open { path: String, source: std::io::Error },

    #[error("no report slots configured")]
    NoSlots,
}

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal is empty")]
    Empty,

    #[error("journal line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("journal line {line}: bad number {value:?}")]
    BadNumber { line: usize, value: String },

    #[error("journal line {line}: bad timestamp {value:?}")]
    BadTimestamp { line: usize, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Permission denied: installing the crash handler requires root privileges")]
    NotRoot,

    #[error("Could not resolve the real path of the handler executable: {0}")]
    ExecutablePath(std::io::Error),

    #[error("Could not write {path}: {source}")]
    WriteFailed { path: String, source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_error_display() {
        let err = TraceError::AttachFailed {
            pid: Pid(1234),
            source: std::io::Error::from_raw_os_error(libc::EPERM),
        };
        assert!(err.to_string().contains("pid 1234"));
        assert_eq!(err.os_error(), Some(libc::EPERM));
    }

    #[test]
    fn test_journal_error_display() {
        let err = JournalError::BadTimestamp { line: 3, value: "yesterday".to_string() };
        assert_eq!(err.to_string(), "journal line 3: bad timestamp \"yesterday\"");
    }
}
