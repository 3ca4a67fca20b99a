//! Domain types providing compile-time safety and self-documentation
//!
//! The crashed process is always a 32-bit ARM task, so addresses are `u32`
//! regardless of the width of the handler's own pointers.

use std::fmt;

/// Process ID of the crashed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub i32);

impl Pid {
    /// Raw value in the form the `libc` calls expect
    #[must_use]
    pub fn as_raw(self) -> libc::pid_t {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid)
    }
}

/// Signal number delivered to the crashed task (0 = no signal context)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(pub u32);

impl Signal {
    /// Returns true if the kernel passed a real signal number
    #[must_use]
    pub fn is_present(self) -> bool {
        self.0 != 0
    }

    /// Short name for the fatal signals a crash handler normally sees
    #[must_use]
    pub fn name(self) -> &'static str {
        match i32::try_from(self.0).unwrap_or(-1) {
            libc::SIGILL => "SIGILL",
            libc::SIGABRT => "SIGABRT",
            libc::SIGBUS => "SIGBUS",
            libc::SIGFPE => "SIGFPE",
            libc::SIGSEGV => "SIGSEGV",
            libc::SIGSTKFLT => "SIGSTKFLT",
            _ => "?",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address in the crashed task's 32-bit address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u32);

impl Address {
    /// Round down to a 4-byte boundary
    #[must_use]
    pub fn align_down(self) -> Self {
        Address(self.0 & !3)
    }

    #[must_use]
    pub fn wrapping_add(self, delta: u32) -> Self {
        Address(self.0.wrapping_add(delta))
    }

    #[must_use]
    pub fn wrapping_sub(self, delta: u32) -> Self {
        Address(self.0.wrapping_sub(delta))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u32> for Address {
    fn from(addr: u32) -> Self {
        Address(addr)
    }
}
