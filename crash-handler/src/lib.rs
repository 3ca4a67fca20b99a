//! # crash-handler - Kernel `core_pattern` Crash Reporter
//!
//! When a process on a 32-bit ARM system dies with a core-dumping signal,
//! the kernel runs this program (registered through `core_pattern`) with the
//! dying task's pid, signal, uid and gid. The handler attaches to the task,
//! reads what it can, and writes a plain-text report into one of a small
//! set of rotating files. A journal of recent crashers is kept alongside.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Kernel core dump (usermode helper)             │
//! │          argv: PID SIGNAL UID GID     stdin: core image         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        CrashSession                             │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │   process    │──▶│     maps     │──▶│    unwind    │        │
//! │  │ (ptrace,proc)│   │ (maps,EXIDX) │   │ (heuristic)  │        │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘        │
//! │                                               │                │
//! │                                               ▼                │
//! │  ┌──────────────┐                      ┌──────────────┐        │
//! │  │   journal    │                      │    report    │        │
//! │  │ (crash loop) │                      │(slots,writer)│        │
//! │  └──────────────┘                      └──────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`process`]: ptrace attach guard, ARM registers, `/proc` readers and
//!   the [`process::RemoteMemory`] read trait
//! - [`maps`]: `/proc/<pid>/maps` parsing and EXIDX discovery from the ELF
//!   headers mapped in the target
//! - [`unwind`]: ARM branch decoding, the heuristic stack scanner, the
//!   [`unwind::Unwinder`] seam and the result selection policy
//! - [`report`]: rotating slot allocation, the section writer, kernel log
//!   tail and the optional core copy
//! - [`journal`]: bounded crash history keyed by process name
//! - [`session`]: one crash, end to end
//! - [`install`]: `core_pattern` registration
//! - [`cli`], [`config`]: arguments and the configuration built from them
//! - [`domain`]: newtypes and error enums
//!
//! ## Failure Model
//!
//! A crash handler must not crash while handling a crash. Inside a session
//! every failure is absorbed where it happens: unreadable memory prints as
//! `--------`, missing registers mark their sections unavailable, a slot
//! that cannot be opened turns the writer into a no-op, and a corrupt
//! journal is reset. Only `--install` exits non-zero.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Register (once, as root)
//! sudo crash-handler --install
//!
//! # Reports then appear after each crash
//! cat /tmp/crash_reports/crash_report_00
//! cat /tmp/crash_journal
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod install;
pub mod journal;
pub mod maps;
pub mod process;
pub mod report;
pub mod session;
pub mod unwind;
