//! # Platform-Specific Implementations
//!
//! Each platform implements [`crate::session::DebugSession`] with its native
//! process-control API:
//!
//! - **Linux**: `ptrace(2)` and `waitpid(2)`
//!   - See: [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//!
//! Other platforms have no backend yet; [`crate::session::create_session`]
//! reports them as unsupported.

#[cfg(target_os = "linux")]
pub mod linux;
