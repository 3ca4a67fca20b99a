//! ptrace-backed snapshot of the crashed task
//!
//! The kernel hands the handler a task that is already inside the core dump
//! path, so attaching does not wait for a stop notification: with
//! `core_pipe_limit` set the dying task is parked until the handler exits,
//! and blocking in `waitpid` here could stall both forever.

#![allow(unsafe_code)] // ptrace(2) has no safe wrapper in libc

use log::{debug, warn};
use std::ffi::c_void;
use std::io;
use std::ptr;

use super::registers::{ArmRegisters, FaultInfo, ARM_REGSET_WORDS};
use super::RemoteMemory;
use crate::domain::{Address, Pid, Signal, TraceError};

/// `NT_PRSTATUS` note type, selects the general purpose register set
const NT_PRSTATUS: usize = 1;

/// Scratch words for `PTRACE_GETREGSET`. Larger than the ARM set so a
/// non-ARM tracee shows up as a size mismatch instead of silent truncation.
const REGSET_SCRATCH_WORDS: usize = 64;

/// Attach guard around the crashed task.
///
/// Detach runs once, only if attach succeeded, and is repeated by `Drop` so
/// an early return anywhere in the session still resumes the target.
#[derive(Debug)]
pub struct ProcessSnapshot {
    pid: Pid,
    attached: bool,
}

impl ProcessSnapshot {
    /// Attach to `pid` with `PTRACE_ATTACH`.
    ///
    /// Failure (permission, already reaped) is not fatal: it is logged and
    /// the returned snapshot simply reports `is_attached() == false`.
    #[must_use]
    pub fn attach(pid: Pid) -> Self {
        match ptrace_request(libc::PTRACE_ATTACH, pid, ptr::null_mut(), ptr::null_mut()) {
            Ok(_) => {
                debug!("ptrace attach to pid {pid} succeeded");
                Self { pid, attached: true }
            }
            Err(source) => {
                let err = TraceError::AttachFailed { pid, source };
                warn!("{err}");
                Self { pid, attached: false }
            }
        }
    }

    /// Snapshot that never attached; every trace read will fail
    #[must_use]
    pub fn detached(pid: Pid) -> Self {
        Self { pid, attached: false }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Read the ARM general purpose registers.
    ///
    /// # Errors
    /// Returns [`TraceError::RegisterReadFailed`] with the OS error, or
    /// [`TraceError::UnsupportedRegisterLayout`] if the tracee is not a
    /// 32-bit ARM task.
    pub fn read_registers(&self) -> Result<ArmRegisters, TraceError> {
        let mut scratch = [0u32; REGSET_SCRATCH_WORDS];
        let mut iov = libc::iovec {
            iov_base: scratch.as_mut_ptr().cast::<c_void>(),
            iov_len: std::mem::size_of_val(&scratch),
        };
        ptrace_request(
            libc::PTRACE_GETREGSET,
            self.pid,
            NT_PRSTATUS as *mut c_void,
            ptr::addr_of_mut!(iov).cast::<c_void>(),
        )
        .map_err(TraceError::RegisterReadFailed)?;

        if iov.iov_len != ARM_REGSET_WORDS * 4 {
            return Err(TraceError::UnsupportedRegisterLayout(iov.iov_len));
        }
        let mut words = [0u32; ARM_REGSET_WORDS];
        words.copy_from_slice(&scratch[..ARM_REGSET_WORDS]);
        Ok(ArmRegisters::from_regset(&words))
    }

    /// Read the signal number and faulting address.
    ///
    /// # Errors
    /// Returns [`TraceError::SigInfoFailed`] when the task has no signal
    /// context or is not traced.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn read_fault_info(&self) -> Result<FaultInfo, TraceError> {
        // SAFETY: siginfo_t is a plain C struct, all-zero is a valid value
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        ptrace_request(
            libc::PTRACE_GETSIGINFO,
            self.pid,
            ptr::null_mut(),
            ptr::addr_of_mut!(info).cast::<c_void>(),
        )
        .map_err(TraceError::SigInfoFailed)?;

        // SAFETY: the kernel filled `info`; si_addr is valid for fault signals
        // and zero otherwise
        let fault_addr = unsafe { info.si_addr() } as usize as u32;
        Ok(FaultInfo { signal: Signal(info.si_signo as u32), fault_addr: Address(fault_addr) })
    }

    /// Read one word with `PTRACE_PEEKDATA`, distinguishing failure by `errno`.
    ///
    /// # Errors
    /// Returns [`TraceError::MemoryReadFailed`] if the address is unmapped or
    /// the task is not traced.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn peek(&self, addr: Address) -> Result<u32, TraceError> {
        clear_errno();
        // SAFETY: PEEKDATA only reads the tracee; both pointers are passed by value
        let word = unsafe {
            libc::ptrace(
                libc::PTRACE_PEEKDATA,
                self.pid.as_raw(),
                addr.0 as usize as *mut c_void,
                ptr::null_mut::<c_void>(),
            )
        };
        if word == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error().unwrap_or(0) != 0 {
                return Err(TraceError::MemoryReadFailed { addr, source: err });
            }
        }
        // Little-endian: on a 64-bit kernel the low half is the word at `addr`
        Ok(word as u32)
    }

    /// Resume the task. Only the first call after a successful attach does
    /// anything.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        match ptrace_request(libc::PTRACE_DETACH, self.pid, ptr::null_mut(), ptr::null_mut()) {
            Ok(_) => debug!("detached from pid {}", self.pid),
            Err(e) => warn!("ptrace detach from pid {} failed: {e}", self.pid),
        }
    }
}

impl Drop for ProcessSnapshot {
    fn drop(&mut self) {
        self.detach();
    }
}

impl RemoteMemory for ProcessSnapshot {
    fn read_word(&self, addr: Address) -> Option<u32> {
        match self.peek(addr) {
            Ok(word) => Some(word),
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }
}

#[cfg(target_env = "musl")]
type PtraceRequest = libc::c_int;
#[cfg(not(target_env = "musl"))]
type PtraceRequest = libc::c_uint;

/// Issue a ptrace request whose result is only success/failure
fn ptrace_request(
    request: PtraceRequest,
    pid: Pid,
    addr: *mut c_void,
    data: *mut c_void,
) -> io::Result<libc::c_long> {
    // SAFETY: callers pass either null or pointers to live, correctly sized
    // buffers for the given request
    let rc = unsafe { libc::ptrace(request, pid.as_raw(), addr, data) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

fn clear_errno() {
    // SAFETY: __errno_location always returns the calling thread's errno slot
    unsafe {
        *libc::__errno_location() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_to_missing_process_is_not_fatal() {
        // Far above pid_max on any stock kernel
        let mut snapshot = ProcessSnapshot::attach(Pid(9_999_999));
        assert!(!snapshot.is_attached());
        assert!(snapshot.read_registers().is_err());
        assert!(snapshot.read_word(Address(0x1000)).is_none());
        // No-op, must not panic
        snapshot.detach();
        snapshot.detach();
    }

    static ALL_ONES: u32 = u32::MAX;

    /// Forked child parked in `pause()`, killed and reaped on drop
    struct Child(libc::pid_t);

    impl Child {
        fn spawn() -> Self {
            // SAFETY: the child only calls pause(), which is async-signal-safe
            let pid = unsafe { libc::fork() };
            assert!(pid >= 0, "fork failed");
            if pid == 0 {
                loop {
                    // SAFETY: no arguments, no shared state
                    unsafe { libc::pause() };
                }
            }
            Self(pid)
        }

        fn pid(&self) -> Pid {
            Pid(self.0)
        }
    }

    impl Drop for Child {
        fn drop(&mut self) {
            // SAFETY: plain syscalls on our own child
            unsafe {
                libc::kill(self.0, libc::SIGKILL);
                let mut status = 0;
                // A stop reported while traced may come first
                while libc::waitpid(self.0, &mut status, 0) == self.0
                    && !libc::WIFEXITED(status)
                    && !libc::WIFSIGNALED(status)
                {}
            }
        }
    }

    /// State letter from `/proc/<pid>/stat`
    fn task_state(pid: Pid) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        stat.rsplit_once(')')?.1.trim_start().chars().next()
    }

    fn wait_for_state(pid: Pid, wanted: impl Fn(char) -> bool) -> bool {
        for _ in 0..500 {
            if task_state(pid).is_some_and(&wanted) {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        false
    }

    fn is_running(state: char) -> bool {
        state != 't' && state != 'T'
    }

    #[test]
    fn test_attach_peek_detach_resumes_child() {
        let child = Child::spawn();
        assert!(wait_for_state(child.pid(), |s| s == 'S'), "child never went to sleep");

        let mut snapshot = ProcessSnapshot::attach(child.pid());
        if !snapshot.is_attached() {
            eprintln!("ptrace not permitted in this environment, skipping");
            return;
        }
        assert!(wait_for_state(child.pid(), |s| s == 't'), "child never entered tracing stop");

        // Unmapped page: errno is set, so this is an error and not data
        assert!(matches!(snapshot.peek(Address(0)), Err(TraceError::MemoryReadFailed { .. })));
        // The fork shares our layout; only checkable where it fits in 32 bits
        if let Ok(addr) = u32::try_from(ptr::addr_of!(ALL_ONES) as usize) {
            assert_eq!(snapshot.peek(Address(addr)).unwrap(), u32::MAX);
        }

        snapshot.detach();
        assert!(!snapshot.is_attached());
        assert!(wait_for_state(child.pid(), is_running), "detach did not resume the child");

        // Second detach from Drop does nothing
        drop(snapshot);
        assert!(wait_for_state(child.pid(), is_running));
        assert_eq!(task_state(child.pid()), Some('S'));
    }

    #[test]
    fn test_drop_detaches_attached_child() {
        let child = Child::spawn();
        assert!(wait_for_state(child.pid(), |s| s == 'S'), "child never went to sleep");

        let snapshot = ProcessSnapshot::attach(child.pid());
        if !snapshot.is_attached() {
            eprintln!("ptrace not permitted in this environment, skipping");
            return;
        }
        assert!(wait_for_state(child.pid(), |s| s == 't'), "child never entered tracing stop");

        drop(snapshot);
        assert!(wait_for_state(child.pid(), is_running), "drop did not resume the child");
    }

    #[test]
    fn test_detached_snapshot_reads_fail() {
        let snapshot = ProcessSnapshot::detached(Pid(9_999_999));
        let err = snapshot.read_fault_info().unwrap_err();
        assert!(err.to_string().contains("siginfo"));
    }
}
