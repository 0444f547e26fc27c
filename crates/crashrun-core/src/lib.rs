//! # crashrun-core
//!
//! Runs a program under a debugger and decides the launcher's exit code from
//! what happens to it.
//!
//! This crate provides:
//! - Launching a target under trace with configurable session options
//! - A stream of debugger events (signal stops and exits)
//! - Event handlers that turn events into an exit decision
//! - All-thread backtraces, unwound through `.eh_frame`, with symbol and line information
//!
//! ## Platform Support
//!
//! - **Linux**: Uses `ptrace` and `/proc`
//! - **Other platforms**: [`session::create_session`] returns `Unsupported`
//!
//! ## Why unsafe code is needed
//!
//! Launching a traced child and reading its registers go through system
//! calls (`PTRACE_TRACEME` between fork and exec, `PTRACE_GETREGSET`,
//! `tgkill`) that can only be reached through `unsafe` blocks. Each one is
//! wrapped in a safe function inside `platform`.

#![allow(unsafe_code)] // Required for ptrace and raw syscalls

pub mod backtrace;
pub mod error;
pub mod events;
pub mod launcher;
pub mod platform;
pub mod session;
pub mod symbols;
pub mod types;
pub mod unwind;

// Re-export commonly used types
pub use error::{DebuggerError, Result};
pub use events::DebuggerEvent;
pub use launcher::{EventHandlers, Launcher, Outcome, CRASH_EXIT_CODE, FALLBACK_EXIT_CODE};
#[cfg(target_os = "linux")]
pub use platform::linux::LinuxSession;
pub use session::{create_session, DebugSession, SessionCommands, SessionOption, SessionSettings};
pub use types::{ProcessId, Registers, ThreadId};
