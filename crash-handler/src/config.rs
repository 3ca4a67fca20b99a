//! Handler configuration, passed explicitly into [`crate::session::CrashSession`]

use std::path::PathBuf;

use crate::cli::Args;
use crate::unwind::SelectionPolicy;

pub const DEFAULT_REPORT_DIR: &str = "/tmp/crash_reports";
pub const DEFAULT_REPORT_NAME: &str = "crash_report";
pub const DEFAULT_MAX_REPORTS: usize = 10;
pub const DEFAULT_JOURNAL: &str = "/tmp/crash_journal";
pub const DEFAULT_KLOG_TAIL_BYTES: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub report_dir: PathBuf,
    pub report_name: String,
    pub max_reports: usize,
    /// `None` disables the crash journal
    pub journal: Option<PathBuf>,
    pub save_core: bool,
    pub unwind_policy: SelectionPolicy,
    pub klog_tail_bytes: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            report_name: DEFAULT_REPORT_NAME.to_string(),
            max_reports: DEFAULT_MAX_REPORTS,
            journal: Some(PathBuf::from(DEFAULT_JOURNAL)),
            save_core: false,
            unwind_policy: SelectionPolicy::default(),
            klog_tail_bytes: DEFAULT_KLOG_TAIL_BYTES,
        }
    }
}

impl From<&Args> for HandlerConfig {
    fn from(args: &Args) -> Self {
        Self {
            report_dir: args.report_dir.clone(),
            report_name: args.report_name.clone(),
            max_reports: args.max_reports,
            journal: (!args.no_journal).then(|| args.journal.clone()),
            save_core: args.save_core,
            unwind_policy: args.unwind_policy,
            klog_tail_bytes: args.klog_tail_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let args = Args::try_parse_from(["crash-handler", "100", "11", "0", "0"]).unwrap();
        assert_eq!(HandlerConfig::from(&args), HandlerConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::try_parse_from([
            "crash-handler",
            "100",
            "11",
            "1000",
            "1000",
            "--report-dir",
            "/var/crash",
            "--max-reports",
            "3",
            "--no-journal",
            "--save-core",
            "--unwind-policy",
            "prefer-first",
        ])
        .unwrap();
        let config = HandlerConfig::from(&args);
        assert_eq!(config.report_dir, PathBuf::from("/var/crash"));
        assert_eq!(config.max_reports, 3);
        assert_eq!(config.journal, None);
        assert!(config.save_core);
        assert_eq!(config.unwind_policy, SelectionPolicy::PreferFirstSuccess);
    }

    #[test]
    fn test_install_needs_no_positionals() {
        let args = Args::try_parse_from(["crash-handler", "--install"]).unwrap();
        assert!(args.install);
        assert_eq!(args.pid, None);
    }

    #[test]
    fn test_positionals_required_without_install() {
        assert!(Args::try_parse_from(["crash-handler", "100", "11"]).is_err());
    }
}
