//! Which signals stop the session.
//!
//! Signals a program routinely receives during normal operation are handed
//! straight back to it. Every other signal stops the session and is reported
//! as [`crate::events::DebuggerEvent::SignalStop`].

use std::collections::HashSet;

use nix::sys::signal::Signal;

/// Signals passed to the target without stopping, by default.
pub const NOSTOP_SIGNALS: [Signal; 8] = [
    Signal::SIGALRM,
    Signal::SIGURG,
    Signal::SIGCHLD,
    Signal::SIGWINCH,
    Signal::SIGIO,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
    Signal::SIGPWR,
];

/// Per-signal stop/pass policy.
#[derive(Debug, Clone)]
pub struct SignalTable
{
    nostop: HashSet<Signal>,
}

impl Default for SignalTable
{
    fn default() -> Self
    {
        Self {
            nostop: NOSTOP_SIGNALS.into_iter().collect(),
        }
    }
}

impl SignalTable
{
    /// Whether receiving `signal` stops the session.
    pub fn stops(&self, signal: Signal) -> bool
    {
        !self.nostop.contains(&signal)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_crash_signals_stop()
    {
        let table = SignalTable::default();
        for signal in [
            Signal::SIGSEGV,
            Signal::SIGBUS,
            Signal::SIGILL,
            Signal::SIGFPE,
            Signal::SIGABRT,
            Signal::SIGTRAP,
        ] {
            assert!(table.stops(signal), "{signal} should stop");
        }
    }

    #[test]
    fn test_routine_signals_pass()
    {
        let table = SignalTable::default();
        assert!(!table.stops(Signal::SIGCHLD));
        assert!(!table.stops(Signal::SIGWINCH));
        assert!(!table.stops(Signal::SIGALRM));
    }
}
