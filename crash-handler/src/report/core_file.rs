//! Copy of the core image the kernel pipes to the handler on stdin

use log::warn;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Stream `input` into `path`, returning the number of bytes consumed.
///
/// If `path` cannot be created the input is still drained and counted, so
/// the kernel is never left blocked on a full pipe.
///
/// # Errors
/// Returns an error if reading `input` or writing the copy fails midway.
pub fn copy_core(mut input: impl Read, path: &Path) -> io::Result<u64> {
    match OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path) {
        Ok(mut file) => io::copy(&mut input, &mut file),
        Err(e) => {
            warn!("cannot create {}: {e}", path.display());
            io::copy(&mut input, &mut io::sink())
        }
    }
}
