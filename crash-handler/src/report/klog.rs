//! Kernel ring buffer tail

#![allow(unsafe_code)] // klogctl(2)

use log::debug;

/// `SYSLOG_ACTION_READ_ALL`
const SYSLOG_ACTION_READ_ALL: libc::c_int = 3;
/// `SYSLOG_ACTION_SIZE_BUFFER`
const SYSLOG_ACTION_SIZE_BUFFER: libc::c_int = 10;

/// Source of the most recent system log bytes
pub trait KernelLogReader {
    /// Up to `max_bytes` of the newest log text; empty if unavailable
    fn tail(&self, max_bytes: usize) -> Vec<u8>;
}

/// Reads the kernel ring buffer with `klogctl`
#[derive(Debug, Clone, Copy, Default)]
pub struct SyslogReader;

impl KernelLogReader for SyslogReader {
    #[allow(clippy::cast_sign_loss)]
    fn tail(&self, max_bytes: usize) -> Vec<u8> {
        // SAFETY: SIZE_BUFFER ignores the buffer arguments
        let size = unsafe { libc::klogctl(SYSLOG_ACTION_SIZE_BUFFER, std::ptr::null_mut(), 0) };
        if size <= 0 {
            debug!("klogctl size: {}", std::io::Error::last_os_error());
            return Vec::new();
        }
        let mut buffer = vec![0u8; size as usize];
        // SAFETY: the buffer is exactly `size` bytes long
        let read = unsafe {
            libc::klogctl(SYSLOG_ACTION_READ_ALL, buffer.as_mut_ptr().cast::<libc::c_char>(), size)
        };
        if read < 0 {
            debug!("klogctl read: {}", std::io::Error::last_os_error());
            return Vec::new();
        }
        buffer.truncate(read as usize);
        tail_of(buffer, max_bytes)
    }
}

/// Keep only the last `max_bytes` of `bytes`
#[must_use]
pub fn tail_of(mut bytes: Vec<u8>, max_bytes: usize) -> Vec<u8> {
    if bytes.len() > max_bytes {
        bytes.drain(..bytes.len() - max_bytes);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_of_keeps_newest_bytes() {
        assert_eq!(tail_of(b"0123456789".to_vec(), 4), b"6789");
        assert_eq!(tail_of(b"abc".to_vec(), 4000), b"abc");
        assert!(tail_of(b"abc".to_vec(), 0).is_empty());
    }

    #[test]
    fn test_syslog_reader_is_bounded() {
        // May be empty without CAP_SYSLOG; must never exceed the bound
        let tail = SyslogReader.tail(128);
        assert!(tail.len() <= 128);
    }
}
