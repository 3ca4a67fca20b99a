//! Shared fixture: a small ARM process image held in memory

#![allow(dead_code)]

use crash_handler::domain::Address;
use crash_handler::maps::MemoryMapTable;
use crash_handler::process::{ArmRegisters, RemoteMemory};
use std::collections::HashMap;

pub const SP: u32 = 0xbe00_0080;
pub const LR: u32 = 0x8104;
pub const PC: u32 = 0x4000_0200;

/// Sparse word-addressed memory; unset words are unreadable
#[derive(Default)]
pub struct FakeMemory(pub HashMap<u32, u32>);

impl FakeMemory {
    pub fn with(mut self, addr: u32, word: u32) -> Self {
        self.0.insert(addr, word);
        self
    }
}

impl RemoteMemory for FakeMemory {
    fn read_word(&self, addr: Address) -> Option<u32> {
        self.0.get(&addr.0).copied()
    }
}

/// One `/proc/<pid>/maps` line with the name at the fixed column
pub fn maps_line(start: u32, end: u32, perms: &str, name: &str) -> String {
    let head = format!("{start:08x}-{end:08x} {perms} 00000000 1f:02 1234");
    format!("{head:<49}{name}")
}

pub fn listing() -> String {
    [
        maps_line(0x8000, 0x1_0000, "r-xp", "/usr/bin/app"),
        maps_line(0x1_0000, 0x1_1000, "rw-p", "/usr/bin/app"),
        maps_line(0x4000_0000, 0x4010_0000, "r-xp", "/lib/libc.so.6"),
        maps_line(0xbe00_0000, 0xbe00_0100, "rw-p", "[stack]"),
    ]
    .join("\n")
}

pub fn maps() -> MemoryMapTable {
    MemoryMapTable::parse(&listing())
}

pub fn regs() -> ArmRegisters {
    let mut regs = ArmRegisters::default();
    regs.r[13] = SP;
    regs.r[14] = LR;
    regs.r[15] = PC;
    regs
}

/// Crash in libc, called from the app, with three return addresses on the
/// stack (one at the very top slot) and two decoys.
pub fn memory() -> FakeMemory {
    FakeMemory::default()
        // bl 0x8148, the call that lr returns past
        .with(0x8100, 0xEB00_0010)
        // b 0x8210
        .with(0x8200, 0xEA00_0002)
        // mov r0, r0: not a call
        .with(0x4000_0300, 0xE1A0_0000)
        // bl to itself
        .with(0x4000_0400, 0xEBFF_FFFE)
        .with(PC, 0xE590_0000)
        .with(0xbe00_0090, 0x8204)
        .with(0xbe00_00a0, 0x1234_5678)
        .with(0xbe00_00b0, 0x4000_0304)
        .with(0xbe00_00c0, 0x4000_0404)
        .with(0xbe00_0100, LR)
}
