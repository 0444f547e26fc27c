//! # Linux Debugging Implementation
//!
//! Linux-specific session built on `ptrace(2)`.
//!
//! - **Launch**: the child calls `PTRACE_TRACEME` before `execve`, so it stops
//!   at its first instruction
//! - **Threads**: `PTRACE_O_TRACECLONE` attaches every new thread automatically
//! - **Events**: `waitpid(-1, __WALL)` collects stops and exits of all threads
//! - **Cleanup**: `PTRACE_O_EXITKILL` kills the target if the launcher dies
//!
//! ## References
//!
//! - [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//! - [waitpid(2) man page](https://man7.org/linux/man-pages/man2/waitpid.2.html)
//! - [proc_pid_maps(5) man page](https://man7.org/linux/man-pages/man5/proc_pid_maps.5.html)

mod launch;
mod memory;
mod registers;
pub mod signals;
mod threads;
mod tracer;

pub use tracer::LinuxSession;
