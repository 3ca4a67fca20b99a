//! # Process Introspection
//!
//! Everything the handler learns about the dying task comes through this
//! module:
//!
//! - **`trace`**: [`ProcessSnapshot`], a ptrace attach guard that reads
//!   registers, fault info and memory words from the stopped task and
//!   detaches exactly once, on every exit path.
//! - **`registers`**: the fixed 32-bit ARM integer register set.
//! - **`procfs`**: `/proc/<pid>/{cmdline,status,maps}` text, with absence
//!   tolerated.
//!
//! ## Remote Memory Reads
//!
//! All reads of the target's address space go through the [`RemoteMemory`]
//! trait and return `Option`. The unwinder, the ELF scanner and the report
//! writer only ever see this trait, never raw pointers, which also lets the
//! tests drive them from an in-memory image.
//!
//! `PTRACE_PEEKDATA` returns the word itself as the syscall result, so a word
//! whose value is all ones looks exactly like the `-1` error return. The
//! ptrace implementation disambiguates through `errno`, but callers that
//! classify instructions (the unwinder) still treat `0xffffffff` as "no
//! data": a legitimately all-ones word in memory cannot be told apart from a
//! failed read in that context.

pub mod procfs;
pub mod registers;
pub mod trace;

pub use procfs::{ProcFs, ProcInfo};
pub use registers::{ArmRegisters, FaultInfo};
pub use trace::ProcessSnapshot;

use crate::domain::Address;

/// Word value historically used to signal a failed remote read
pub const READ_FAILED_SENTINEL: u32 = 0xffff_ffff;

/// Read-only view of another process's address space
pub trait RemoteMemory {
    /// Read one 32-bit little-endian word, `None` if the address is unreadable
    fn read_word(&self, addr: Address) -> Option<u32>;

    /// Read `len` bytes starting at `addr`, one word at a time.
    ///
    /// Fails as a whole if any covering word is unreadable.
    fn read_block(&self, addr: Address, len: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(len + 4);
        let mut cursor = addr;
        while out.len() < len {
            let word = self.read_word(cursor)?;
            out.extend_from_slice(&word.to_le_bytes());
            cursor = cursor.wrapping_add(4);
        }
        out.truncate(len);
        Some(out)
    }
}

impl<T: RemoteMemory + ?Sized> RemoteMemory for &T {
    fn read_word(&self, addr: Address) -> Option<u32> {
        (**self).read_word(addr)
    }

    fn read_block(&self, addr: Address, len: usize) -> Option<Vec<u8>> {
        (**self).read_block(addr, len)
    }
}
