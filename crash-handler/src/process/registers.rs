//! 32-bit ARM integer register model
//!
//! Layout matches the kernel's `struct pt_regs` for ARM (and the compat
//! `NT_PRSTATUS` register set on 64-bit kernels): `r0..r15`, `cpsr`,
//! `ORIG_r0`.

use crate::domain::{Address, Signal};

/// Words in the ARM `NT_PRSTATUS` register set
pub const ARM_REGSET_WORDS: usize = 18;

/// General purpose registers plus CPSR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmRegisters {
    /// `r0..r15`; r11 is fp, r12 is ip, r13 sp, r14 lr, r15 pc
    pub r: [u32; 16],
    pub cpsr: u32,
}

impl ArmRegisters {
    /// Build from the raw words returned by `PTRACE_GETREGSET`
    #[must_use]
    pub fn from_regset(words: &[u32; ARM_REGSET_WORDS]) -> Self {
        let mut r = [0u32; 16];
        r.copy_from_slice(&words[..16]);
        Self { r, cpsr: words[16] }
    }

    #[must_use]
    pub fn fp(&self) -> u32 {
        self.r[11]
    }

    #[must_use]
    pub fn ip(&self) -> u32 {
        self.r[12]
    }

    #[must_use]
    pub fn sp(&self) -> Address {
        Address(self.r[13])
    }

    #[must_use]
    pub fn lr(&self) -> Address {
        Address(self.r[14])
    }

    #[must_use]
    pub fn pc(&self) -> Address {
        Address(self.r[15])
    }
}

/// Signal context recovered with `PTRACE_GETSIGINFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    pub signal: Signal,
    pub fault_addr: Address,
}
