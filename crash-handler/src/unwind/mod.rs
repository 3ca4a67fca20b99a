//! # Stack Reconstruction
//!
//! Produces candidate call stacks for the crashed task without any symbols.
//!
//! ## Unwinders
//!
//! Every unwinder implements [`Unwinder`]: given remote memory, the parsed
//! memory map and the registers, it returns a frame list plus whether frame
//! 0's `pc` looked sane. Two kinds plug into this seam:
//!
//! - **`heuristic`**: [`HeuristicUnwinder`], which treats any stack word that
//!   points just past a `B`/`BL` instruction as a saved return address.
//! - **table-driven**: an EXIDX-based unwinder supplied by the caller. It
//!   consumes the `exidx_start`/`exidx_end` ranges filled in by
//!   [`crate::maps::scan_exidx`].
//!
//! ## Choosing a Result
//!
//! When several unwinders run, [`SelectionPolicy`] picks the one whose
//! frames drive the stack dump. `PreferLast` reproduces the long-standing
//! behaviour where the heuristic result, run last, always wins. Whether a
//! metadata-driven result should win instead is an open product decision,
//! which is why `PreferFirstSuccess` exists and both are tested.
//!
//! ## Frames Are Candidates
//!
//! A [`Frame`] is a guess: the function estimate is just the target of the
//! branch that preceded the return address, never checked against a real
//! function entry. False positives (data that decodes as a branch) and
//! false negatives (tail calls, `BX`/`BLX` callers, Thumb code) are both
//! expected.

pub mod arm;
pub mod heuristic;

pub use heuristic::HeuristicUnwinder;

use crate::domain::Address;
use crate::maps::MemoryMapTable;
use crate::process::{ArmRegisters, RemoteMemory};

/// One candidate call-stack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub index: u32,
    /// Where execution was (frame 0) or the call site (deeper frames)
    pub execution_address: Address,
    /// Branch target of the call that created this frame
    pub function_estimate: Address,
    /// Stack slot the frame was found at; `sp` for frame 0
    pub stack_addr: Address,
}

impl Frame {
    /// Distance from the estimated function start
    #[must_use]
    pub fn offset_in_function(&self) -> u32 {
        self.execution_address.0.wrapping_sub(self.function_estimate.0)
    }
}

/// Output of a single unwinder run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnwindResult {
    pub frames: Vec<Frame>,
    pub frame0_pc_sane: bool,
}

impl UnwindResult {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Common contract of the heuristic and table-driven unwinders
pub trait Unwinder {
    /// Label used in the report's `[call stack]` section
    fn name(&self) -> &'static str;

    fn unwind(
        &self,
        memory: &dyn RemoteMemory,
        maps: &MemoryMapTable,
        regs: &ArmRegisters,
    ) -> UnwindResult;
}

/// Result of one unwinder, tagged with its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindRun {
    pub unwinder: &'static str,
    pub result: UnwindResult,
}

/// Which run's frames become authoritative when more than one unwinder ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SelectionPolicy {
    /// The last unwinder to run wins, even with zero frames
    #[default]
    PreferLast,
    /// The first run with at least one frame wins; falls back to the last
    #[value(name = "prefer-first")]
    PreferFirstSuccess,
}

impl SelectionPolicy {
    #[must_use]
    pub fn select(self, runs: &[UnwindRun]) -> Option<&UnwindRun> {
        match self {
            SelectionPolicy::PreferLast => runs.last(),
            SelectionPolicy::PreferFirstSuccess => {
                runs.iter().find(|run| !run.result.frames.is_empty()).or_else(|| runs.last())
            }
        }
    }
}

/// Run every unwinder in order
#[must_use]
pub fn run_unwinders(
    unwinders: &[&dyn Unwinder],
    memory: &dyn RemoteMemory,
    maps: &MemoryMapTable,
    regs: &ArmRegisters,
) -> Vec<UnwindRun> {
    unwinders
        .iter()
        .map(|unwinder| {
            let result = unwinder.unwind(memory, maps, regs);
            log::info!("{} unwinder: {} frames", unwinder.name(), result.depth());
            UnwindRun { unwinder: unwinder.name(), result }
        })
        .collect()
}
