//! # crash-handler - Main Entry Point
//!
//! Two modes:
//! - **Handler** (`crash-handler PID SIGNAL UID GID`): run by the kernel for
//!   every core dump; always exits 0
//! - **Install** (`--install`): register this binary in `core_pattern`

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io;

use crash_handler::cli::Args;
use crash_handler::config::HandlerConfig;
use crash_handler::domain::{Pid, Signal};
use crash_handler::install;
use crash_handler::session::{CrashRequest, CrashSession};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    if args.install {
        let pattern = install::install().context("Failed to install crash handler")?;
        println!("core_pattern: {pattern}");
        return Ok(());
    }

    let (Some(pid), Some(signal), Some(uid), Some(gid)) =
        (args.pid, args.signal, args.uid, args.gid)
    else {
        anyhow::bail!(
            "Missing required argument: PID SIGNAL UID GID\n\n\
             Usage:\n  \
             crash-handler <PID> <SIGNAL> <UID> <GID>\n  \
             crash-handler --install\n\n\
             Run 'crash-handler --help' for more options"
        );
    };

    let request = CrashRequest { pid: Pid(pid), signal: Signal(signal), uid, gid };
    let session = CrashSession::new(HandlerConfig::from(&args));
    let outcome = session.generate_report(request, io::stdin().lock());
    info!(
        "pid {pid}: report {:?}, {} frames, journal count {:?}",
        outcome.report, outcome.frames, outcome.journal_count
    );
    Ok(())
}
