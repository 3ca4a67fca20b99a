//! Minimal 32-bit ARM (A32) branch decoder
//!
//! Only the `B`/`BL` immediate forms matter to the unwinder:
//!
//! ```text
//!  31  28 27 25 24 23                                   0
//! +------+-----+--+--------------------------------------+
//! | cond | 101 |L |           signed imm24               |
//! +------+-----+--+--------------------------------------+
//! ```
//!
//! target = address of the instruction + 8 + (sign_extend(imm24) << 2)

use crate::domain::Address;

/// Bits 27..24 of `B`
pub const OPCODE_B: u32 = 0b1010;
/// Bits 27..24 of `BL`
pub const OPCODE_BL: u32 = 0b1011;

/// The PC reads two instructions ahead of the one executing
const PIPELINE_OFFSET: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `B` (`link == false`) or `BL` with its byte offset, pipeline included
    Branch { link: bool, offset: i32 },
    Other,
}

#[must_use]
pub fn decode(word: u32) -> Instruction {
    match opcode(word) {
        OPCODE_B => Instruction::Branch { link: false, offset: branch_offset(word) },
        OPCODE_BL => Instruction::Branch { link: true, offset: branch_offset(word) },
        _ => Instruction::Other,
    }
}

/// Bits 27..24
#[must_use]
pub fn opcode(word: u32) -> u32 {
    (word >> 24) & 0xf
}

/// True for `B` and `BL`, whatever the condition field
#[must_use]
pub fn is_branch(word: u32) -> bool {
    matches!(decode(word), Instruction::Branch { .. })
}

/// Sign-extended imm24, scaled to bytes, plus the pipeline offset
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn branch_offset(word: u32) -> i32 {
    // Move imm24 to the top, then arithmetic-shift back down by 6: sign
    // extension and the `<< 2` in one step
    (((word << 8) as i32) >> 6) + PIPELINE_OFFSET
}

/// Destination of the branch encoded by `word` located at `at`
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn branch_target(at: Address, word: u32) -> Address {
    Address(at.0.wrapping_add(branch_offset(word) as u32))
}
