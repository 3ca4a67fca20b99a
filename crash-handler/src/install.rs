//! Registration as the kernel's core dump handler
//!
//! The kernel runs a `|`-prefixed `core_pattern` as a usermode helper with
//! the core image on stdin. `core_pipe_limit` must be non-zero, otherwise
//! the kernel may reap the crashed task before the handler can inspect
//! `/proc/<pid>`.

#![allow(unsafe_code)] // geteuid() requires unsafe

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::InstallError;

pub const CORE_PATTERN: &str = "/proc/sys/kernel/core_pattern";
pub const CORE_PIPE_LIMIT: &str = "/proc/sys/kernel/core_pipe_limit";

/// The sysctl files the installer writes
#[derive(Debug, Clone)]
pub struct KernelSettings {
    pub core_pattern: PathBuf,
    pub core_pipe_limit: PathBuf,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            core_pattern: PathBuf::from(CORE_PATTERN),
            core_pipe_limit: PathBuf::from(CORE_PIPE_LIMIT),
        }
    }
}

impl KernelSettings {
    /// Point `core_pattern` at `exe` and allow one concurrent pipe helper.
    ///
    /// # Errors
    /// Returns [`InstallError::WriteFailed`] naming the file that could not
    /// be written.
    pub fn register(&self, exe: &Path) -> Result<String, InstallError> {
        let pattern = core_pattern_for(exe);
        write_setting(&self.core_pattern, &pattern)?;
        write_setting(&self.core_pipe_limit, "1")?;
        Ok(pattern)
    }
}

/// `|<exe> %p %s %u %g`: pid, signal, uid, gid in positional order
#[must_use]
pub fn core_pattern_for(exe: &Path) -> String {
    format!("|{} %p %s %u %g", exe.display())
}

/// Install the running executable as the system crash handler.
///
/// # Errors
/// Fails without root, when the executable path cannot be resolved, or when
/// a sysctl file cannot be written.
pub fn install() -> Result<String, InstallError> {
    check_privileges()?;
    let exe = std::env::current_exe()
        .and_then(fs::canonicalize)
        .map_err(InstallError::ExecutablePath)?;
    let pattern = KernelSettings::default().register(&exe)?;
    info!("core_pattern set to {pattern}");
    Ok(pattern)
}

fn check_privileges() -> Result<(), InstallError> {
    if unsafe { libc::geteuid() } == 0 {
        Ok(())
    } else {
        Err(InstallError::NotRoot)
    }
}

fn write_setting(path: &Path, value: &str) -> Result<(), InstallError> {
    fs::write(path, value)
        .map_err(|source| InstallError::WriteFailed { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_pattern_format() {
        assert_eq!(
            core_pattern_for(Path::new("/usr/sbin/crash-handler")),
            "|/usr/sbin/crash-handler %p %s %u %g"
        );
    }

    #[test]
    fn test_register_writes_both_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = KernelSettings {
            core_pattern: dir.path().join("core_pattern"),
            core_pipe_limit: dir.path().join("core_pipe_limit"),
        };
        settings.register(Path::new("/opt/bin/crash-handler")).unwrap();
        assert_eq!(
            fs::read_to_string(&settings.core_pattern).unwrap(),
            "|/opt/bin/crash-handler %p %s %u %g"
        );
        assert_eq!(fs::read_to_string(&settings.core_pipe_limit).unwrap(), "1");
    }

    #[test]
    fn test_register_reports_failing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = KernelSettings {
            core_pattern: dir.path().join("missing").join("core_pattern"),
            core_pipe_limit: dir.path().join("core_pipe_limit"),
        };
        let err = settings.register(Path::new("/bin/x")).unwrap_err();
        assert!(matches!(err, InstallError::WriteFailed { ref path, .. } if path.ends_with("core_pattern")));
        assert!(!settings.core_pipe_limit.exists());
    }
}
