//! # Types
//!
//! Platform-agnostic types used throughout the launcher and its backend.

pub mod address;
pub mod process;
pub mod registers;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use process::{Architecture, MemoryRegion, ProcessId, ThreadId};
pub use registers::Registers;
pub use stack::{FrameStatus, StackFrame};
pub use symbols::{SourceLocation, SymbolLanguage, SymbolName};
