//! # Crash-Handling Launcher
//!
//! Runs a program under a [`DebugSession`] and turns what happens to it into
//! an exit code:
//!
//! - the target is stopped by a signal: print a backtrace of all threads and
//!   exit with [`CRASH_EXIT_CODE`];
//! - the target exits with a status: exit with that same status;
//! - the event stream ends without either: exit with [`FALLBACK_EXIT_CODE`].
//!
//! The decision is a returned [`Outcome`]. Nothing in this module ends the
//! process; the binary calls `std::process::exit` once with the code
//! [`Launcher::run`] returns.
//!
//! ## Example
//!
//! ```rust,no_run
//! use crashrun_core::launcher::Launcher;
//! use crashrun_core::session::{create_session, SessionSettings};
//!
//! let mut session = create_session()?;
//! let code = Launcher::new(SessionSettings::default()).run(session.as_mut(), "./my-test", &[])?;
//! std::process::exit(code);
//! # Ok::<(), crashrun_core::DebuggerError>(())
//! ```

use tracing::{debug, error, info, warn};

use crate::error::{DebuggerError, Result};
use crate::events::{signal_name, DebuggerEvent};
use crate::session::{DebugSession, SessionCommands, SessionSettings};
use crate::types::ThreadId;

/// Exit code used when the target is stopped by a signal.
pub const CRASH_EXIT_CODE: i32 = 2;

/// Exit code used when the target went away without an exit status.
pub const FALLBACK_EXIT_CODE: i32 = 1;

/// What the launcher should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome
{
    /// Keep running the target and wait for the next event.
    Continue,
    /// Stop processing events and exit with this code.
    Terminate(i32),
}

type StopHandler = Box<dyn FnMut(i32, Option<ThreadId>, &mut dyn SessionCommands) -> Outcome>;
type ExitHandler = Box<dyn FnMut(Option<i32>) -> Outcome>;

/// Handlers for the two event kinds, keyed by [`DebuggerEvent`] variant
///
/// An event whose kind has no handler is ignored (`Outcome::Continue`).
#[derive(Default)]
pub struct EventHandlers
{
    stop: Option<StopHandler>,
    exit: Option<ExitHandler>,
}

impl EventHandlers
{
    /// Empty handler set.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Register the handler for [`DebuggerEvent::SignalStop`], replacing any previous one.
    pub fn on_stop<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(i32, Option<ThreadId>, &mut dyn SessionCommands) -> Outcome + 'static,
    {
        self.stop = Some(Box::new(handler));
        self
    }

    /// Register the handler for [`DebuggerEvent::Exited`], replacing any previous one.
    pub fn on_exit<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(Option<i32>) -> Outcome + 'static,
    {
        self.exit = Some(Box::new(handler));
        self
    }

    /// Route `event` to its handler.
    pub fn dispatch(&mut self, event: &DebuggerEvent, commands: &mut dyn SessionCommands) -> Outcome
    {
        match *event {
            DebuggerEvent::SignalStop { signal, thread } => match self.stop.as_mut() {
                Some(handler) => handler(signal, thread, commands),
                None => Outcome::Continue,
            },
            DebuggerEvent::Exited { code } => match self.exit.as_mut() {
                Some(handler) => handler(code),
                None => Outcome::Continue,
            },
        }
    }
}

/// The launcher's handlers
///
/// - signal stop: one backtrace of all threads, then `Terminate(CRASH_EXIT_CODE)`.
///   A failed backtrace is logged; the exit code is the same either way.
/// - exit with a code: `Terminate(code)`.
/// - exit without a code: `Continue`.
#[must_use]
pub fn crash_handlers() -> EventHandlers
{
    let mut handlers = EventHandlers::new();
    handlers
        .on_stop(|signal, thread, commands| {
            warn!(
                signal = %signal_name(signal),
                thread = thread.map(|t| t.raw()),
                "target stopped by signal, dumping all thread backtraces"
            );
            if let Err(err) = commands.backtrace_all_threads() {
                error!("failed to print backtrace: {err}");
            }
            Outcome::Terminate(CRASH_EXIT_CODE)
        })
        .on_exit(|code| match code {
            Some(code) => Outcome::Terminate(code),
            None => Outcome::Continue,
        });
    handlers
}

/// Drives a session from settings to exit code.
pub struct Launcher
{
    settings: SessionSettings,
    handlers: EventHandlers,
}

impl Launcher
{
    /// Launcher with the crash handlers from [`crash_handlers`].
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self
    {
        Self::with_handlers(settings, crash_handlers())
    }

    /// Launcher with caller-supplied handlers.
    #[must_use]
    pub fn with_handlers(settings: SessionSettings, handlers: EventHandlers) -> Self
    {
        Self { settings, handlers }
    }

    /// Apply settings, launch `program`, and handle events until an exit code is decided
    ///
    /// Events after the first `Terminate` are never pulled from the session.
    /// If the session ends without one, the result is [`FALLBACK_EXIT_CODE`].
    ///
    /// When the decision is made while the target is still alive (a crash),
    /// the session is asked to quit. If the user declines the quit prompt, the
    /// target is resumed and event handling goes on.
    ///
    /// ## Errors
    ///
    /// Propagates session failures: bad settings, launch failures, trace errors.
    pub fn run<S>(&mut self, session: &mut S, program: &str, args: &[String]) -> Result<i32>
    where
        S: DebugSession + ?Sized,
    {
        for option in self.settings.options() {
            debug!(?option, "applying session option");
            session.set_option(option)?;
        }

        let pid = session.launch(program, args)?;
        info!(%pid, program, "target launched");

        while let Some(event) = session.next_event()? {
            debug!(event = %event.describe(), "dispatching event");

            let Outcome::Terminate(code) = self.handlers.dispatch(&event, session.as_commands()) else {
                continue;
            };

            if session.is_alive() {
                match session.quit() {
                    Ok(()) => {}
                    Err(DebuggerError::QuitDeclined) => {
                        warn!("quit declined, resuming target");
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            }

            info!(code, "launcher terminating");
            return Ok(code);
        }

        info!(code = FALLBACK_EXIT_CODE, "target finished without a terminating event");
        Ok(FALLBACK_EXIT_CODE)
    }
}

#[cfg(test)]
mod tests
{
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct CountingCommands
    {
        backtraces: usize,
    }

    impl SessionCommands for CountingCommands
    {
        fn backtrace_all_threads(&mut self) -> Result<()>
        {
            self.backtraces += 1;
            Ok(())
        }
    }

    struct FailingCommands;

    impl SessionCommands for FailingCommands
    {
        fn backtrace_all_threads(&mut self) -> Result<()>
        {
            Err(DebuggerError::NotStopped)
        }
    }

    #[test]
    fn test_stop_requests_one_backtrace_and_terminates_with_crash_code()
    {
        let mut commands = CountingCommands { backtraces: 0 };
        let outcome = crash_handlers().dispatch(
            &DebuggerEvent::SignalStop {
                signal: 11,
                thread: None,
            },
            &mut commands,
        );
        assert_eq!(outcome, Outcome::Terminate(CRASH_EXIT_CODE));
        assert_eq!(commands.backtraces, 1);
    }

    #[test]
    fn test_failed_backtrace_still_terminates_with_crash_code()
    {
        let outcome = crash_handlers().dispatch(
            &DebuggerEvent::SignalStop {
                signal: 6,
                thread: None,
            },
            &mut FailingCommands,
        );
        assert_eq!(outcome, Outcome::Terminate(CRASH_EXIT_CODE));
    }

    #[test]
    fn test_exit_with_code_is_mirrored()
    {
        let mut commands = CountingCommands { backtraces: 0 };
        let mut handlers = crash_handlers();
        for code in [0, 7, 255, -1] {
            let outcome = handlers.dispatch(&DebuggerEvent::Exited { code: Some(code) }, &mut commands);
            assert_eq!(outcome, Outcome::Terminate(code));
        }
        assert_eq!(commands.backtraces, 0);
    }

    #[test]
    fn test_exit_without_code_continues()
    {
        let mut commands = CountingCommands { backtraces: 0 };
        let outcome = crash_handlers().dispatch(&DebuggerEvent::Exited { code: None }, &mut commands);
        assert_eq!(outcome, Outcome::Continue);
    }

    #[test]
    fn test_unregistered_event_kind_is_ignored()
    {
        let mut commands = CountingCommands { backtraces: 0 };
        let mut handlers = EventHandlers::new();
        handlers.on_exit(|_| Outcome::Terminate(9));

        let stop = DebuggerEvent::SignalStop {
            signal: 11,
            thread: None,
        };
        assert_eq!(handlers.dispatch(&stop, &mut commands), Outcome::Continue);
        assert_eq!(commands.backtraces, 0);
    }

    #[test]
    fn test_registering_again_replaces_handler()
    {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);

        let mut handlers = EventHandlers::new();
        handlers.on_exit(|_| Outcome::Terminate(1));
        handlers.on_exit(move |_| {
            seen.set(seen.get() + 1);
            Outcome::Continue
        });

        let mut commands = CountingCommands { backtraces: 0 };
        assert_eq!(
            handlers.dispatch(&DebuggerEvent::Exited { code: Some(3) }, &mut commands),
            Outcome::Continue
        );
        assert_eq!(calls.get(), 1);
    }
}
