//! # Error Types
//!
//! General error handling for the launcher and its debugger backend.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for debugger operations
///
/// ## Error Categories
///
/// 1. **Process errors**: ProcessNotFound, LaunchFailed, NotAttached
/// 2. **State errors**: NotStopped, QuitDeclined
/// 3. **Inspection errors**: ReadRegistersFailed, MemoryReadFailed
/// 4. **Permission errors**: PermissionDenied
/// 5. **Platform errors**: Ptrace (Linux), Unsupported
/// 6. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum DebuggerError
{
    /// The process or thread with the given id doesn't exist or has exited
    #[error("Process not found: PID {0}")]
    ProcessNotFound(u32),

    /// Insufficient permissions to trace the target process
    ///
    /// On Linux, this usually means ptrace is restricted by Yama
    /// (`/proc/sys/kernel/yama/ptrace_scope`) or by a container seccomp policy.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid argument passed to a debugger function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The target program could not be started under the debugger
    #[error("Failed to launch program: {0}")]
    LaunchFailed(String),

    /// Operation requires a launched target
    #[error("Not attached to a process")]
    NotAttached,

    /// Operation requires the target to be stopped
    #[error("Process must be stopped for this operation")]
    NotStopped,

    /// Failed to read registers from a thread
    #[error("Failed to read registers of thread {thread}: {details}")]
    ReadRegistersFailed
    {
        /// Thread whose registers were requested
        thread: u64,
        /// Additional error details
        details: String,
    },

    /// Failed to read target memory
    #[error("Failed to read memory at 0x{address:016x}: {details}")]
    MemoryReadFailed
    {
        /// Address that could not be read
        address: u64,
        /// Additional error details
        details: String,
    },

    /// The user answered "n" to the quit confirmation prompt
    #[error("Quit not confirmed")]
    QuitDeclined,

    /// No debugger backend exists for this platform or architecture
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Raw ptrace/wait failure
    #[cfg(target_os = "linux")]
    #[error("ptrace error: {0}")]
    Ptrace(#[from] nix::errno::Errno),

    /// I/O error (for `/proc` reads, terminal prompts, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, DebuggerError>`
///
/// ```rust
/// use crashrun_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DebuggerError>;
