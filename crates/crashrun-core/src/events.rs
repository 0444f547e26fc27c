//! Debugger event types and helpers.
//!
//! A session reports what happened to the target as a [`DebuggerEvent`]. The
//! launcher routes each event to the handler registered for its variant (see
//! [`crate::launcher::EventHandlers`]).

use crate::types::ThreadId;

/// Event emitted by a debugger backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerEvent
{
    /// The target was stopped by a signal the session is configured to stop on.
    SignalStop
    {
        /// Signal number reported by the kernel.
        signal: i32,
        /// Thread that received the signal (if known).
        thread: Option<ThreadId>,
    },
    /// The target process is gone.
    Exited
    {
        /// Exit status, or `None` when the process was killed by a signal
        /// without a stop being reported first.
        code: Option<i32>,
    },
}

impl DebuggerEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::SignalStop { signal, thread } => {
                let mut description = format!("Program received signal {}", signal_name(*signal));
                if let Some(thread_id) = thread {
                    description.push_str(&format!(" (thread {})", thread_id.raw()));
                }
                description
            }
            Self::Exited { code: Some(code) } => format!("Process exited with code: {code}"),
            Self::Exited { code: None } => "Process terminated without an exit code".to_string(),
        }
    }
}

/// Symbolic name of a signal number (`SIGSEGV`), falling back to `signal N`.
#[must_use]
pub fn signal_name(signal: i32) -> String
{
    #[cfg(target_os = "linux")]
    {
        if let Ok(sig) = nix::sys::signal::Signal::try_from(signal) {
            return sig.as_str().to_string();
        }
    }

    format!("signal {signal}")
}
