//! # Linux Process Launch
//!
//! Starts the target with `PTRACE_TRACEME` so it stops on its first
//! instruction after `execve`, before any of its own code runs.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

use nix::errno::Errno;
use nix::sys::personality::{self, Persona};
use nix::sys::ptrace::{self, Options};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::debug;

use crate::error::{DebuggerError, Result};

/// Options set on every traced thread.
pub(crate) fn trace_options() -> Options
{
    Options::PTRACE_O_TRACECLONE | Options::PTRACE_O_TRACEEXEC | Options::PTRACE_O_EXITKILL
}

/// Spawn `program` traced, wait for its exec trap, and return its PID
///
/// The target is left stopped.
pub(crate) fn spawn_traced(program: &str, args: &[String], disable_randomization: bool) -> Result<Pid>
{
    let mut command = Command::new(program);
    command.args(args);

    // SAFETY: only async-signal-safe calls between fork and exec.
    unsafe {
        command.pre_exec(move || {
            // The launcher ignores SIGINT while it runs; the target must not inherit that.
            signal(Signal::SIGINT, SigHandler::SigDfl).map_err(io::Error::from)?;

            if disable_randomization {
                let persona = personality::get().map_err(io::Error::from)?;
                personality::set(persona | Persona::ADDR_NO_RANDOMIZE).map_err(io::Error::from)?;
            }

            ptrace::traceme().map_err(io::Error::from)
        });
    }

    let child = command.spawn().map_err(|err| match err.raw_os_error() {
        Some(libc::EPERM) => DebuggerError::PermissionDenied(format!("cannot trace {program}: {err}")),
        _ => DebuggerError::LaunchFailed(format!("{program}: {err}")),
    })?;

    let pid = Pid::from_raw(i32::try_from(child.id()).map_err(|_| DebuggerError::LaunchFailed("pid overflow".into()))?);

    match waitpid(pid, None)? {
        WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
        WaitStatus::Exited(_, code) => {
            return Err(DebuggerError::LaunchFailed(format!(
                "{program} exited with code {code} before it could be traced"
            )))
        }
        other => {
            return Err(DebuggerError::LaunchFailed(format!(
                "unexpected first stop of {program}: {other:?}"
            )))
        }
    }

    match ptrace::setoptions(pid, trace_options()) {
        Ok(()) => {}
        Err(Errno::EPERM) => {
            return Err(DebuggerError::PermissionDenied(format!(
                "cannot set trace options on {program}"
            )))
        }
        Err(err) => return Err(err.into()),
    }

    debug!(%pid, program, disable_randomization, "target stopped at exec");
    Ok(pid)
}
