//! # Memory Layout of the Crashed Task
//!
//! Two steps turn `/proc/<pid>/maps` into something the unwinder can use:
//!
//! 1. **`memory_maps`**: fixed-column parse of the listing into the set of
//!    *executable* segments, plus the `[stack]` bounds kept on the side.
//!    Only segments that can contain call instructions are retained, and the
//!    stack is never one of them, so stack data cannot pass as code.
//!
//! 2. **`exidx`**: for each segment that starts with an ELF header in the
//!    live process, walk its program headers (read one at a time from the
//!    target) and record the `PT_ARM_EXIDX` range. This feeds the
//!    table-driven unwinder only; the heuristic unwinder ignores it.
//!
//! ```text
//! 6f000000-6f01e000 r-xp 00000000 00:0c 16389419   /system/lib/libfoo.so
//! 0         1         2         3         4         5
//! 012345678901234567890123456789012345678901234567890
//! ^start   ^end       ^perm x                      ^name
//! ```

pub mod exidx;
pub mod memory_maps;

pub use exidx::{find_exidx, scan_exidx};
pub use memory_maps::{MemoryMapTable, MemorySegment, StackBounds};
