//! Memory map parsing for the crashed task
//!
//! `/proc/<pid>/maps` lines of a 32-bit task have fixed columns: start
//! address at 0, end address at 9, execute permission at 20, name at 49.

use log::{debug, info};

use crate::domain::{Address, Pid};
use crate::process::ProcFs;

/// Shortest line (newline stripped) that still reaches the name column
pub const MIN_LINE_LEN: usize = 50;

const END_COLUMN: usize = 9;
const EXEC_COLUMN: usize = 20;
const NAME_COLUMN: usize = 49;

/// Longest segment name retained, in bytes
pub const MAX_SEGMENT_NAME: usize = 256;

const STACK_NAME: &str = "[stack]";

/// An executable mapping of the crashed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySegment {
    pub start: Address,
    pub end: Address,
    pub name: String,
    /// Absolute `PT_ARM_EXIDX` range, zero until [`super::scan_exidx`] fills it
    pub exidx_start: Address,
    pub exidx_end: Address,
}

impl MemorySegment {
    #[must_use]
    pub fn new(start: Address, end: Address, name: &str) -> Self {
        Self {
            start,
            end,
            name: bounded_name(name),
            exidx_start: Address(0),
            exidx_end: Address(0),
        }
    }

    /// Check if an address falls within this segment
    #[must_use]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn has_exidx(&self) -> bool {
        self.exidx_end > self.exidx_start
    }
}

/// Bounds of the `[stack]` mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBounds {
    pub start: Address,
    pub end: Address,
}

/// Executable segments plus the stack bounds, for one crash session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMapTable {
    /// Unordered: lookups are by containment, never by position
    pub segments: Vec<MemorySegment>,
    pub stack: Option<StackBounds>,
}

impl MemoryMapTable {
    /// Parse a whole maps listing.
    ///
    /// Malformed or truncated lines are skipped; nothing here fails.
    #[must_use]
    pub fn parse(listing: &str) -> Self {
        let mut table = Self::default();
        for line in listing.lines() {
            match parse_line(line) {
                Some(ParsedLine::Stack(bounds)) => {
                    debug!("stack: {} - {}", bounds.start, bounds.end);
                    table.stack = Some(bounds);
                }
                Some(ParsedLine::Executable(segment)) => table.segments.push(segment),
                None => {}
            }
        }
        table
    }

    /// Read and parse `/proc/<pid>/maps`; an unreadable listing yields an
    /// empty table
    #[must_use]
    pub fn from_proc(procfs: &ProcFs, pid: Pid) -> (Self, Option<String>) {
        let Some(listing) = procfs.maps(pid) else {
            return (Self::default(), None);
        };
        let table = Self::parse(&listing);
        info!(
            "pid {pid}: {} executable segments, stack {}",
            table.segments.len(),
            if table.stack.is_some() { "found" } else { "missing" }
        );
        (table, Some(listing))
    }

    /// Find the segment containing `addr` and the offset into it
    #[must_use]
    pub fn lookup(&self, addr: Address) -> Option<(&MemorySegment, u32)> {
        self.segments
            .iter()
            .find(|segment| segment.contains(addr))
            .map(|segment| (segment, addr.0 - segment.start.0))
    }

    /// Name of the segment containing `addr`, or `fallback`
    #[must_use]
    pub fn name_for<'a>(&'a self, addr: Address, fallback: &'a str) -> &'a str {
        self.lookup(addr).map_or(fallback, |(segment, _)| segment.name.as_str())
    }
}

enum ParsedLine {
    Stack(StackBounds),
    Executable(MemorySegment),
}

fn parse_line(line: &str) -> Option<ParsedLine> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    if line.len() < MIN_LINE_LEN {
        return None;
    }
    let name = line.get(NAME_COLUMN..)?;

    if name == STACK_NAME {
        let start = leading_hex(line)?;
        let end = leading_hex(line.get(END_COLUMN..)?)?;
        return Some(ParsedLine::Stack(StackBounds { start, end }));
    }

    if line.as_bytes()[EXEC_COLUMN] != b'x' {
        return None;
    }
    let start = leading_hex(line)?;
    let end = leading_hex(line.get(END_COLUMN..)?)?;
    Some(ParsedLine::Executable(MemorySegment::new(start, end, name)))
}

/// Parse the hex digits at the start of `text`, `strtoul`-style
fn leading_hex(text: &str) -> Option<Address> {
    let digits = text.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(text.len());
    u32::from_str_radix(&text[..digits], 16).ok().map(Address)
}

fn bounded_name(name: &str) -> String {
    if name.len() <= MAX_SEGMENT_NAME {
        return name.to_string();
    }
    let mut cut = MAX_SEGMENT_NAME;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name[..cut].to_string()
}
