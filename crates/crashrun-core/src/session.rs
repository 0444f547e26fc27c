//! # Debug Session
//!
//! The interface between the launcher and a platform debugger backend.
//!
//! The launcher never talks to ptrace directly. It applies
//! [`SessionSettings`], launches the program, then pulls [`DebuggerEvent`]s
//! out of a [`DebugSession`] one at a time. Event handlers get the narrower
//! [`SessionCommands`] view, which only lets them ask for diagnostics.
//!
//! Keeping this a trait lets the launcher's decision logic be exercised with a
//! scripted fake session (see `tests/launcher.rs`).

use std::io::{self, BufRead, Write};

use crate::error::Result;
use crate::events::DebuggerEvent;
use crate::types::ProcessId;

/// One debugger setting, applied before the target is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOption
{
    /// Ask before killing a live target on quit.
    Confirm(bool),
    /// Pause long output (the backtrace) every screenful.
    Pagination(bool),
    /// Launch the target with address-space layout randomization turned off.
    DisableRandomization(bool),
}

/// Startup configuration for a session
///
/// The defaults are for unattended use: no prompts, no paging, and ASLR off
/// so crash addresses repeat from run to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings
{
    /// Ask before killing a live target on quit.
    pub confirm: bool,
    /// Page backtrace output when stdout is a terminal.
    pub pagination: bool,
    /// Turn off ASLR for the target.
    pub disable_randomization: bool,
}

impl Default for SessionSettings
{
    fn default() -> Self
    {
        Self {
            confirm: false,
            pagination: false,
            disable_randomization: true,
        }
    }
}

impl SessionSettings
{
    /// The settings as options, in the order they must be applied.
    #[must_use]
    pub fn options(&self) -> [SessionOption; 3]
    {
        [
            SessionOption::Confirm(self.confirm),
            SessionOption::Pagination(self.pagination),
            SessionOption::DisableRandomization(self.disable_randomization),
        ]
    }
}

/// Commands an event handler may issue while the target is stopped.
pub trait SessionCommands
{
    /// Print a backtrace of every thread of the target to standard output.
    ///
    /// ## Errors
    ///
    /// Fails if the target is not stopped or its threads can't be inspected.
    fn backtrace_all_threads(&mut self) -> Result<()>;
}

/// A debugger session driving one target program
///
/// ## Lifecycle
///
/// 1. `set_option()` for each setting
/// 2. `launch(program, args)`
/// 3. `next_event()` until it returns `None` or the caller decides to stop
/// 4. `quit()` if the target is still alive
pub trait DebugSession: SessionCommands
{
    /// Apply one setting. Must be called before [`DebugSession::launch`].
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` if the target has already been launched.
    fn set_option(&mut self, option: SessionOption) -> Result<()>;

    /// Start `program` under debugger control.
    ///
    /// The target does not run any of its own code until the first
    /// [`DebugSession::next_event`] call.
    ///
    /// ## Errors
    ///
    /// `LaunchFailed` if the program can't be spawned, `PermissionDenied` if
    /// tracing is not allowed.
    fn launch(&mut self, program: &str, args: &[String]) -> Result<ProcessId>;

    /// Resume the target and block until the next reportable event.
    ///
    /// Returns `Ok(None)` once the target is gone and no events remain.
    ///
    /// ## Errors
    ///
    /// Propagates wait/trace failures from the backend.
    fn next_event(&mut self) -> Result<Option<DebuggerEvent>>;

    /// Whether the target process still exists.
    fn is_alive(&self) -> bool;

    /// End the session, killing the target if it is still alive.
    ///
    /// ## Errors
    ///
    /// `QuitDeclined` if confirmation is on and the user answered no.
    fn quit(&mut self) -> Result<()>;

    /// This session seen through the handler-facing interface.
    fn as_commands(&mut self) -> &mut dyn SessionCommands;
}

/// Create the debug session for the current platform
///
/// ## Errors
///
/// Returns `Unsupported` on platforms without a backend.
pub fn create_session() -> Result<Box<dyn DebugSession>>
{
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(crate::platform::linux::LinuxSession::new()))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(crate::error::DebuggerError::Unsupported(format!(
            "no debugger backend for platform: {}",
            std::env::consts::OS
        )))
    }
}

/// Ask a yes/no question and read the answer from `input`
///
/// Anything starting with `y` counts as yes, and so does end of input, so a
/// closed stdin never blocks a quit. Other input counts as no.
///
/// ## Errors
///
/// Propagates read/write failures.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool>
{
    write!(output, "{question} (y or n) ")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output, "[answered Y; input not from terminal]")?;
        return Ok(true);
    }

    Ok(answer.trim_start().to_ascii_lowercase().starts_with('y'))
}

#[cfg(test)]
mod tests
{
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_default_settings_disable_prompts_and_randomization()
    {
        let settings = SessionSettings::default();
        assert!(!settings.confirm);
        assert!(!settings.pagination);
        assert!(settings.disable_randomization);
    }

    #[test]
    fn test_options_order_is_confirm_pagination_randomization()
    {
        let options = SessionSettings::default().options();
        assert_eq!(
            options,
            [
                SessionOption::Confirm(false),
                SessionOption::Pagination(false),
                SessionOption::DisableRandomization(true),
            ]
        );
    }

    #[test]
    fn test_confirm_answers()
    {
        let mut out = Vec::new();
        assert!(confirm(&mut Cursor::new("y\n"), &mut out, "Quit anyway?").unwrap());
        assert!(confirm(&mut Cursor::new("  Yes\n"), &mut out, "Quit anyway?").unwrap());
        assert!(!confirm(&mut Cursor::new("n\n"), &mut out, "Quit anyway?").unwrap());
        assert!(!confirm(&mut Cursor::new("\n"), &mut out, "Quit anyway?").unwrap());

        let prompt = String::from_utf8(out).unwrap();
        assert!(prompt.starts_with("Quit anyway? (y or n) "));
    }

    #[test]
    fn test_confirm_end_of_input_means_yes()
    {
        let mut out = Vec::new();
        assert!(confirm(&mut Cursor::new(""), &mut out, "Quit anyway?").unwrap());
        assert!(String::from_utf8(out).unwrap().contains("answered Y"));
    }
}
