//! Best-guess unwinder: instruction-pattern heuristics, no metadata
//!
//! A word is taken to be a saved return address when the word just before
//! the address it points to lies in an executable segment and decodes as a
//! `B`/`BL`. Nothing confirms the branch target is a real function entry.

use log::debug;

use super::arm;
use super::{Frame, UnwindResult, Unwinder};
use crate::domain::Address;
use crate::maps::MemoryMapTable;
use crate::process::{ArmRegisters, RemoteMemory, READ_FAILED_SENTINEL};

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicUnwinder;

impl HeuristicUnwinder {
    /// True if `addr` looks like a return address
    #[must_use]
    pub fn plausible_return(
        memory: &dyn RemoteMemory,
        maps: &MemoryMapTable,
        addr: Address,
    ) -> bool {
        call_site(memory, maps, addr).is_some()
    }
}

/// The call instruction preceding `addr`, if it passes the oracle
fn call_site(
    memory: &dyn RemoteMemory,
    maps: &MemoryMapTable,
    addr: Address,
) -> Option<(Address, u32)> {
    let probe = addr.wrapping_sub(4);
    // [stack] is never in the segment set, so stack data fails here
    maps.lookup(probe)?;
    let word = memory.read_word(probe)?;
    if word == READ_FAILED_SENTINEL {
        return None;
    }
    arm::is_branch(word).then_some((probe, word))
}

impl Unwinder for HeuristicUnwinder {
    fn name(&self) -> &'static str {
        "best-guess"
    }

    fn unwind(
        &self,
        memory: &dyn RemoteMemory,
        maps: &MemoryMapTable,
        regs: &ArmRegisters,
    ) -> UnwindResult {
        let (sp, pc, lr) = (regs.sp(), regs.pc(), regs.lr());
        let frame0_pc_sane = maps.lookup(pc).is_some();

        // Without a plausible first return address, produce nothing
        let Some((probe, word)) = call_site(memory, maps, lr) else {
            debug!("lr {lr} does not follow a branch instruction");
            return UnwindResult { frames: Vec::new(), frame0_pc_sane };
        };

        let mut frames = vec![Frame {
            index: 0,
            execution_address: pc,
            function_estimate: arm::branch_target(probe, word),
            stack_addr: sp,
        }];

        let Some(stack) = maps.stack else {
            debug!("no [stack] mapping, only frame 0 available");
            return UnwindResult { frames, frame0_pc_sane };
        };

        // Every aligned slot from sp up to and including the stack end
        let first = (u64::from(sp.0) + 3) & !3;
        let last = u64::from(stack.end.0);
        let mut index = 0;
        for slot in (first..=last).step_by(4) {
            #[allow(clippy::cast_possible_truncation)]
            let slot = Address(slot as u32);
            let Some(value) = memory.read_word(slot) else {
                continue;
            };
            if let Some((probe, word)) = call_site(memory, maps, Address(value)) {
                index += 1;
                debug!("at sp={slot}: possible return address {value:08x}");
                frames.push(Frame {
                    index,
                    execution_address: probe,
                    function_estimate: arm::branch_target(probe, word),
                    stack_addr: slot,
                });
            }
        }

        UnwindResult { frames, frame0_pc_sane }
    }
}
