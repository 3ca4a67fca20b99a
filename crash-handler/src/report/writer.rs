//! Report section writer
//!
//! Sections are written in a fixed order, forward only. Nothing is ever
//! rewritten: a partial report after a failed read is still useful, so the
//! writer never aborts on bad data, and a write error just disables it.

use log::warn;
use std::fmt;
use std::io::Write;

use crate::domain::{Address, Pid, Signal, TraceError};
use crate::maps::MemoryMapTable;
use crate::process::{ArmRegisters, FaultInfo, ProcInfo, RemoteMemory};
use crate::unwind::arm::{self, Instruction};
use crate::unwind::{Frame, UnwindRun};

/// Bytes of stack shown below `sp`
const STACK_LEAD_BYTES: u32 = 64;
/// Bytes of stack shown past the end of the window
const STACK_TRAIL_BYTES: u64 = 64;
/// Only this many frames bound the stack window
pub const STACK_CONTENT_DEPTH: usize = 32;
/// Words on each side of `pc` in `[code around PC]`
const PC_WINDOW_WORDS: u32 = 16;
/// The unwinder should find at least this many frames
const MIN_USEFUL_DEPTH: usize = 2;

/// A remote word, or a marker where the read failed
struct Word(Option<u32>);

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(word) => write!(f, "{word:08x}"),
            None => f.write_str("--------"),
        }
    }
}

/// Bounds `[start, end]` of the annotated stack dump.
///
/// Starts 64 bytes below `sp` (word aligned). Ends at the stack slot of the
/// deepest of the first [`STACK_CONTENT_DEPTH`] frames, or when unwinding
/// found nothing, at `(sp | 0xff) + 0xff`.
#[must_use]
pub fn stack_window(sp: Address, frames: &[Frame]) -> (Address, Address) {
    let start = Address(sp.0.saturating_sub(STACK_LEAD_BYTES)).align_down();
    let end = match frames.len() {
        0 => Address((sp.0 | 0xff).saturating_add(0xff)),
        n => frames[n.min(STACK_CONTENT_DEPTH) - 1].stack_addr,
    };
    (start, end)
}

/// Word-aligned addresses in `[start, end]`, without wrapping
#[allow(clippy::cast_possible_truncation)]
fn words(start: u64, end: u64) -> impl Iterator<Item = Address> {
    (start..=end.min(u64::from(u32::MAX))).step_by(4).map(|a| Address(a as u32))
}

/// Writes the crash report into a slot file (or any `Write`)
pub struct ReportWriter<W: Write> {
    sink: Option<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink: Some(sink) }
    }

    /// A writer with no slot; every section becomes a no-op
    #[must_use]
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn into_inner(self) -> Option<W> {
        self.sink
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write_fmt(args) {
                warn!("report write failed, dropping the rest: {e}");
                self.sink = None;
            }
        }
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write_all(bytes) {
                warn!("report write failed, dropping the rest: {e}");
                self.sink = None;
            }
        }
    }

    pub fn task_info(&mut self, pid: Pid, uid: u32, gid: u32, info: &ProcInfo, signal: Signal) {
        self.emit(format_args!("[task info]\n"));
        self.emit(format_args!("pid: {pid}, uid: {uid}, gid: {gid} \n"));
        self.emit(format_args!("cmdline: {}\n", info.cmdline));
        self.emit(format_args!("name: {}\n", info.name));
        self.emit(format_args!("signal: {signal}\n\n"));
    }

    pub fn memory_maps(&mut self, listing: Option<&str>) {
        self.emit(format_args!("[memory maps]\n"));
        match listing {
            Some(listing) => {
                for line in listing.lines() {
                    self.emit(format_args!(" {line}\n"));
                }
            }
            None => self.emit(format_args!("memory maps unavailable\n")),
        }
        self.emit(format_args!("\n"));
    }

    pub fn exception_info(&mut self, signal: Signal, fault: &Result<FaultInfo, TraceError>) {
        self.emit(format_args!("[exception info]\n"));
        match fault {
            Ok(fault) => self.emit(format_args!(
                "signal {signal} ({}), fault addr {}\n",
                signal.name(),
                fault.fault_addr
            )),
            Err(e) => self.emit(format_args!("{e}\n")),
        }
        self.emit(format_args!("\n"));
    }

    pub fn registers(&mut self, regs: &Result<ArmRegisters, TraceError>) {
        self.emit(format_args!("[registers]\n"));
        match regs {
            Ok(regs) => {
                let r = &regs.r;
                self.emit(format_args!(
                    " r0 {:08x}  r1 {:08x}  r2 {:08x}  r3 {:08x}\n",
                    r[0], r[1], r[2], r[3]
                ));
                self.emit(format_args!(
                    " r4 {:08x}  r5 {:08x}  r6 {:08x}  r7 {:08x}\n",
                    r[4], r[5], r[6], r[7]
                ));
                self.emit(format_args!(
                    " r8 {:08x}  r9 {:08x}  10 {:08x}  fp {:08x}\n",
                    r[8],
                    r[9],
                    r[10],
                    regs.fp()
                ));
                self.emit(format_args!(
                    " ip {:08x}  sp {}  lr {}  pc {}  cpsr {:08x}\n",
                    regs.ip(),
                    regs.sp(),
                    regs.lr(),
                    regs.pc(),
                    regs.cpsr
                ));
            }
            Err(e) => self.emit(format_args!("{e}\n")),
        }
        self.emit(format_args!("\n"));
    }

    /// Sixteen words either side of `pc`, branches decoded
    pub fn code_around_pc(&mut self, memory: &dyn RemoteMemory, regs: Option<&ArmRegisters>) {
        self.emit(format_args!("[code around PC]\n"));
        let Some(regs) = regs else {
            self.emit(format_args!("registers unavailable\n\n"));
            return;
        };
        let pc = regs.pc();
        let start = u64::from(pc.0.saturating_sub(PC_WINDOW_WORDS * 4));
        let end = u64::from(pc.0) + u64::from(PC_WINDOW_WORDS * 4) - 4;
        for addr in words(start, end) {
            let word = memory.read_word(addr);
            let decoded = match word.map(arm::decode) {
                Some(Instruction::Branch { link, .. }) => {
                    let target = arm::branch_target(addr, word.unwrap_or_default());
                    format!("  ; {} {target}", if link { "bl" } else { "b" })
                }
                _ => String::new(),
            };
            let marker = if addr == pc { " <-- PC" } else { "" };
            self.emit(format_args!("0x{addr}: {}{decoded}{marker}\n", Word(word)));
        }
        self.emit(format_args!("\n"));
    }

    /// Frame lists of every unwinder that ran
    pub fn call_stack(&mut self, runs: &[UnwindRun], maps: &MemoryMapTable) {
        self.emit(format_args!("[call stack]\n"));
        for run in runs {
            self.emit(format_args!("= {} unwinder =\n", run.unwinder));
            if run.result.frames.is_empty() {
                self.emit(format_args!("no frames found\n"));
                continue;
            }
            self.emit(format_args!(
                "Crash occurred at PC: 0x{}\n",
                run.result.frames[0].execution_address
            ));
            for frame in &run.result.frames {
                self.emit(format_args!(
                    "#{}:0x{} in function 0x{} at offset 0x{:x}  {}\n",
                    frame.index,
                    frame.execution_address,
                    frame.function_estimate,
                    frame.offset_in_function(),
                    maps.name_for(frame.execution_address, "<unknown>")
                ));
            }
        }
        self.emit(format_args!("\n"));
    }

    /// Bare `pc`/`lr` lines when unwinding found fewer than two frames
    pub fn pc_lr_fallback(&mut self, regs: &ArmRegisters, maps: &MemoryMapTable, depth: usize) {
        if depth >= MIN_USEFUL_DEPTH {
            return;
        }
        if depth == 0 {
            self.emit(format_args!(
                "         #00  pc {}  {}\n",
                regs.pc(),
                maps.name_for(regs.pc(), "<unknown>")
            ));
        }
        self.emit(format_args!(
            "         #01  lr {}  {}\n",
            regs.lr(),
            maps.name_for(regs.lr(), "<unknown>")
        ));
    }

    /// 16 bytes before the crash address through the crash address, four
    /// words per line. Uses `lr` when frame 0's `pc` is not sane.
    pub fn code(&mut self, memory: &dyn RemoteMemory, regs: &ArmRegisters, frame0_pc_sane: bool) {
        self.emit(format_args!("[code]\n"));
        let around = if frame0_pc_sane { regs.pc() } else { regs.lr() };
        let end = u64::from(around.align_down().0);
        let mut line_start = end.saturating_sub(16);
        while line_start <= end {
            self.emit(format_args!(" {:08x}  ", line_start));
            for addr in words(line_start, line_start + 12) {
                self.emit(format_args!(" {}", Word(memory.read_word(addr))));
            }
            self.emit(format_args!("\n"));
            line_start += 16;
        }
        self.emit(format_args!("\n"));
    }

    /// Annotated stack words, frame slots marked `#NN`
    pub fn stack_dump(
        &mut self,
        memory: &dyn RemoteMemory,
        maps: &MemoryMapTable,
        sp: Address,
        frames: &[Frame],
    ) {
        self.emit(format_args!("[stack dump]\n"));
        let (start, end) = stack_window(sp, frames);

        // With pc == 0 the first two frames share the same slot
        let mut next =
            usize::from(frames.len() >= 2 && frames[0].stack_addr == frames[1].stack_addr);

        let mut last = None;
        for addr in words(u64::from(start.0), u64::from(end.0)) {
            let value = memory.read_word(addr);
            let label = match frames.get(next) {
                Some(frame) if frame.stack_addr == addr => {
                    next += 1;
                    format!("#{:02}", frame.index)
                }
                _ => "   ".to_string(),
            };
            self.stack_line(&label, addr, value, maps);
            last = Some(addr);
        }

        let trail_start = last.map_or(u64::from(start.0), |a| u64::from(a.0) + 4);
        for addr in words(trail_start, trail_start + STACK_TRAIL_BYTES) {
            self.stack_line("   ", addr, memory.read_word(addr), maps);
        }
        self.emit(format_args!("\n"));
    }

    fn stack_line(&mut self, label: &str, addr: Address, value: Option<u32>, maps: &MemoryMapTable) {
        let name = value.map_or("", |v| maps.name_for(Address(v), ""));
        self.emit(format_args!("{label} {addr}  {}  {name}\n", Word(value)));
    }

    /// Section header with a one-line reason in place of its body
    pub fn unavailable(&mut self, section: &str, reason: &dyn fmt::Display) {
        self.emit(format_args!("[{section}]\n{reason}\n\n"));
    }

    pub fn kernel_log(&mut self, tail: &[u8]) {
        self.emit(format_args!("[kernel log]\n"));
        self.emit_bytes(tail);
        if !tail.is_empty() && !tail.ends_with(b"\n") {
            self.emit(format_args!("\n"));
        }
    }

    pub fn core_size(&mut self, bytes: u64) {
        self.emit(format_args!("Total bytes in core dump: {bytes}\n"));
    }

    pub fn done(&mut self) {
        self.emit(format_args!("--- done ---\n"));
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                warn!("report flush failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32, stack_addr: u32) -> Frame {
        Frame {
            index,
            execution_address: Address(0x8000),
            function_estimate: Address(0x8000),
            stack_addr: Address(stack_addr),
        }
    }

    #[test]
    fn test_stack_window_without_frames() {
        let (start, end) = stack_window(Address(0xbe00_1004), &[]);
        assert_eq!(start, Address(0xbe00_0fc4));
        assert_eq!(end, Address(0xbe00_11fe));
    }

    #[test]
    fn test_stack_window_uses_deepest_frame() {
        let frames = [frame(0, 0xbe00_1000), frame(1, 0xbe00_1010), frame(2, 0xbe00_1040)];
        let (start, end) = stack_window(Address(0xbe00_1000), &frames);
        assert_eq!(start, Address(0xbe00_0fc0));
        assert_eq!(end, Address(0xbe00_1040));
    }

    #[test]
    fn test_stack_window_caps_frame_depth() {
        let frames: Vec<Frame> = (0..40).map(|i| frame(i, 0xbe00_1000 + i * 8)).collect();
        let (_, end) = stack_window(Address(0xbe00_1000), &frames);
        assert_eq!(end, Address(0xbe00_1000 + 31 * 8));
    }

    #[test]
    fn test_stack_window_near_zero_does_not_wrap() {
        let (start, _) = stack_window(Address(0x20), &[]);
        assert_eq!(start, Address(0));
    }

    #[test]
    fn test_disabled_writer_is_a_no_op() {
        let mut writer = ReportWriter::<Vec<u8>>::disabled();
        writer.memory_maps(Some("line"));
        writer.done();
        assert!(!writer.is_enabled());
        assert!(writer.into_inner().is_none());
    }

    #[test]
    fn test_word_marker_for_failed_reads() {
        assert_eq!(Word(None).to_string(), "--------");
        assert_eq!(Word(Some(0xab)).to_string(), "000000ab");
    }
}
