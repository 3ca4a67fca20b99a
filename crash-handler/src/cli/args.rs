//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::unwind::SelectionPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "crash-handler",
    about = "Record a diagnostic report for a crashed process (kernel core_pattern helper)",
    after_help = "\
EXAMPLES:
    sudo crash-handler --install          Register as the kernel core_pattern handler
    crash-handler 1234 11 0 0 < core      What the kernel runs for pid 1234, SIGSEGV"
)]
pub struct Args {
    /// Pid of the crashed process (%p)
    #[arg(value_name = "PID", required_unless_present = "install")]
    pub pid: Option<i32>,

    /// Signal that caused the dump (%s)
    #[arg(value_name = "SIGNAL", required_unless_present = "install")]
    pub signal: Option<u32>,

    /// Real uid of the crashed process (%u)
    #[arg(value_name = "UID", required_unless_present = "install")]
    pub uid: Option<u32>,

    /// Real gid of the crashed process (%g)
    #[arg(value_name = "GID", required_unless_present = "install")]
    pub gid: Option<u32>,

    /// Register this executable in /proc/sys/kernel/core_pattern and exit
    #[arg(long, conflicts_with_all = ["pid", "signal", "uid", "gid"])]
    pub install: bool,

    /// Directory holding the rotating report files
    #[arg(long, value_name = "DIR", default_value = "/tmp/crash_reports")]
    pub report_dir: PathBuf,

    /// Report file prefix; files are named <NAME>_<NN>
    #[arg(long, value_name = "NAME", default_value = "crash_report")]
    pub report_name: String,

    /// Number of report slots kept before the oldest is reused
    #[arg(long, value_name = "N", default_value = "10")]
    pub max_reports: usize,

    /// Crash journal file
    #[arg(long, value_name = "FILE", default_value = "/tmp/crash_journal")]
    pub journal: PathBuf,

    /// Do not update the crash journal
    #[arg(long)]
    pub no_journal: bool,

    /// Copy the core image from stdin to <DIR>/core_<NN>
    #[arg(long)]
    pub save_core: bool,

    /// Which unwinder result drives the stack dump
    #[arg(long, value_enum, default_value_t = SelectionPolicy::PreferLast)]
    pub unwind_policy: SelectionPolicy,

    /// Bytes of kernel log appended to the report
    #[arg(long, value_name = "BYTES", default_value = "4000")]
    pub klog_tail_bytes: usize,
}
