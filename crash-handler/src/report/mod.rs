//! # Crash Report Persistence
//!
//! Reports live in a fixed, rotating set of slot files:
//!
//! ```text
//! /tmp/crash_reports/crash_report_00
//! /tmp/crash_reports/crash_report_01
//! ...
//! /tmp/crash_reports/crash_report_09
//! ```
//!
//! - **`slots`**: [`ReportStore`] picks the first slot that does not exist
//!   yet (created exclusively, so two handlers never share one), otherwise
//!   recycles the least recently modified.
//! - **`writer`**: [`ReportWriter`] emits the labelled sections in one
//!   forward, append-only pass. A missing slot turns every write into a
//!   no-op; a failed read turns into an "unavailable" line.
//! - **`klog`**: the kernel ring buffer tail appended at the end.
//! - **`core_file`**: optional copy of the core image piped on stdin.

pub mod core_file;
pub mod klog;
pub mod slots;
pub mod writer;

pub use core_file::copy_core;
pub use klog::{KernelLogReader, SyslogReader};
pub use slots::{ReportSlot, ReportStore};
pub use writer::{stack_window, ReportWriter};
