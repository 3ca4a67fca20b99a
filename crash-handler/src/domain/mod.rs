//! Domain model for the crash handler
//!
//! Core newtypes and error enums shared by every stage of a crash session:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

pub use types::{Address, Pid, Signal};

pub use errors::{InstallError, JournalError, SlotError, TraceError};
