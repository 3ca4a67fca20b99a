//! One crash, one session
//!
//! [`CrashSession`] owns everything a single invocation needs: the
//! configuration, the `/proc` root, the kernel log source and an optional
//! table-driven unwinder. Nothing is process-global, so tests can build a
//! session against a scratch directory and a fake `/proc`.

use log::{info, warn};
use std::io::{BufWriter, Read};
use std::path::PathBuf;

use crate::config::HandlerConfig;
use crate::domain::{Pid, Signal};
use crate::journal::{journal_name, CrashJournal};
use crate::maps::{scan_exidx, MemoryMapTable};
use crate::process::{ProcFs, ProcessSnapshot};
use crate::report::{copy_core, KernelLogReader, ReportStore, ReportWriter, SyslogReader};
use crate::unwind::{run_unwinders, HeuristicUnwinder, Unwinder};

/// The four values the kernel passes through `core_pattern`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashRequest {
    pub pid: Pid,
    pub signal: Signal,
    pub uid: u32,
    pub gid: u32,
}

/// What a session produced, for logging and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Report file, `None` when no slot could be allocated
    pub report: Option<PathBuf>,
    /// Frames in the selected unwinder run
    pub frames: usize,
    /// Crash count for this name after the journal update
    pub journal_count: Option<u32>,
    /// Bytes of core image copied, with `save_core`
    pub core_bytes: Option<u64>,
}

pub struct CrashSession {
    config: HandlerConfig,
    procfs: ProcFs,
    klog: Box<dyn KernelLogReader>,
    table_unwinder: Option<Box<dyn Unwinder>>,
}

impl CrashSession {
    #[must_use]
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            procfs: ProcFs::default(),
            klog: Box::new(SyslogReader),
            table_unwinder: None,
        }
    }

    #[must_use]
    pub fn with_procfs(mut self, procfs: ProcFs) -> Self {
        self.procfs = procfs;
        self
    }

    #[must_use]
    pub fn with_kernel_log(mut self, klog: Box<dyn KernelLogReader>) -> Self {
        self.klog = klog;
        self
    }

    /// Run `unwinder` ahead of the heuristic one
    #[must_use]
    pub fn with_table_unwinder(mut self, unwinder: Box<dyn Unwinder>) -> Self {
        self.table_unwinder = Some(unwinder);
        self
    }

    /// Write one report for the crashed task.
    ///
    /// Never fails: every problem along the way becomes a report line or a
    /// log warning. `core` is the core image the kernel pipes in; it is only
    /// read with `save_core`.
    pub fn generate_report(&self, request: CrashRequest, core: impl Read) -> SessionOutcome {
        let CrashRequest { pid, signal, uid, gid } = request;
        let mut outcome = SessionOutcome::default();

        let store = ReportStore::new(
            &self.config.report_dir,
            self.config.report_name.as_str(),
            self.config.max_reports,
        );
        let (slot_index, mut writer) = match store.allocate() {
            Ok(slot) => {
                info!("writing crash report for pid {pid} to {}", slot.path.display());
                outcome.report = Some(slot.path);
                (Some(slot.index), ReportWriter::new(BufWriter::new(slot.file)))
            }
            Err(e) => {
                warn!("{e}; continuing without a report");
                (None, ReportWriter::disabled())
            }
        };

        let proc_info = self.procfs.proc_info(pid);
        writer.task_info(pid, uid, gid, &proc_info, signal);

        let (mut maps, listing) = MemoryMapTable::from_proc(&self.procfs, pid);
        writer.memory_maps(listing.as_deref());

        let mut target = ProcessSnapshot::attach(pid);
        if signal.is_present() {
            writer.exception_info(signal, &target.read_fault_info());
        }

        let regs = target.read_registers();
        writer.registers(&regs);
        writer.code_around_pc(&target, regs.as_ref().ok());

        match &regs {
            Ok(regs) => {
                scan_exidx(&target, &mut maps.segments);

                let heuristic = HeuristicUnwinder;
                let mut unwinders: Vec<&dyn Unwinder> = Vec::with_capacity(2);
                if let Some(table) = self.table_unwinder.as_deref() {
                    unwinders.push(table);
                }
                unwinders.push(&heuristic);
                let runs = run_unwinders(&unwinders, &target, &maps, regs);
                writer.call_stack(&runs, &maps);

                let selected = self.config.unwind_policy.select(&runs);
                let frames = selected.map_or(&[][..], |run| run.result.frames.as_slice());
                let frame0_pc_sane =
                    selected.map_or_else(|| maps.lookup(regs.pc()).is_some(), |run| {
                        run.result.frame0_pc_sane
                    });
                outcome.frames = frames.len();

                writer.pc_lr_fallback(regs, &maps, frames.len());
                writer.code(&target, regs, frame0_pc_sane);
                writer.stack_dump(&target, &maps, regs.sp(), frames);
            }
            Err(e) => {
                writer.unavailable("call stack", e);
                writer.unavailable("stack dump", e);
            }
        }

        // All remote reads are done; let the kernel finish the dump
        target.detach();

        writer.kernel_log(&self.klog.tail(self.config.klog_tail_bytes));

        if self.config.save_core {
            if let Some(index) = slot_index {
                let path = store.companion_path("core", index);
                match copy_core(core, &path) {
                    Ok(bytes) => {
                        info!("saved {bytes} bytes of core to {}", path.display());
                        writer.core_size(bytes);
                        outcome.core_bytes = Some(bytes);
                    }
                    Err(e) => warn!("problem saving core to {}: {e}", path.display()),
                }
            }
        }

        writer.done();

        if let Some(path) = &self.config.journal {
            let journal = CrashJournal::new(path).record(pid, &proc_info.cmdline);
            outcome.journal_count =
                journal.find(&journal_name(&proc_info.cmdline)).map(|record| record.count);
        }

        outcome
    }
}
