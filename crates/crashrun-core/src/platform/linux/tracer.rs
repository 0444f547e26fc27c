use std::io::{self, IsTerminal};

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, info, trace, warn};

use super::launch::spawn_traced;
use super::memory::PtraceMemory;
use super::registers::read_registers;
use super::signals::SignalTable;
use super::threads::ThreadList;
use crate::backtrace::{Backtrace, Pager, ThreadBacktrace};
use crate::error::{DebuggerError, Result};
use crate::events::DebuggerEvent;
use crate::session::{confirm, DebugSession, SessionCommands, SessionOption, SessionSettings};
use crate::symbols::maps::read_maps;
use crate::symbols::SymbolCache;
use crate::types::{Architecture, ProcessId, ThreadId};
use crate::unwind::StackUnwinder;

/// A traced target process.
struct Target
{
    pid: Pid,
    threads: ThreadList,
    /// Thread stopped at the last reported event and the signal to hand back to it.
    reported: Option<(Pid, Option<Signal>)>,
    /// Other threads stopped by us for inspection.
    halted: Vec<(Pid, Option<Signal>)>,
    alive: bool,
}

/// `waitpid` target meaning any traced thread.
fn any_thread() -> Pid
{
    Pid::from_raw(-1)
}

fn thread_id(tid: Pid) -> ThreadId
{
    ThreadId::from(u64::try_from(tid.as_raw()).unwrap_or_default())
}

/// Resume `tid`, tolerating threads that vanished in the meantime.
fn resume(tid: Pid, signal: Option<Signal>) -> Result<()>
{
    match ptrace::cont(tid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Send `signal` to one thread of `pid`.
fn tgkill(pid: Pid, tid: Pid, signal: Signal) -> Result<()>
{
    // SAFETY: tgkill takes three integers and touches no memory.
    let ret = unsafe { libc::syscall(libc::SYS_tgkill, pid.as_raw(), tid.as_raw(), signal as libc::c_int) };
    if ret == -1 {
        return Err(Errno::last().into());
    }
    Ok(())
}

impl Target
{
    fn resume_stopped(&mut self) -> Result<()>
    {
        for (tid, signal) in self.halted.drain(..) {
            resume(tid, signal)?;
        }
        if let Some((tid, signal)) = self.reported.take() {
            trace!(%tid, ?signal, "resuming reported thread");
            resume(tid, signal)?;
        }
        Ok(())
    }

    /// Wait for the next event worth reporting, resuming through the rest.
    fn wait_event(&mut self, signals: &SignalTable) -> Result<Option<DebuggerEvent>>
    {
        loop {
            let status = match waitpid(any_thread(), Some(WaitPidFlag::__WALL)) {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    debug!(pid = %self.pid, "no traced threads left");
                    self.alive = false;
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            };

            match status {
                WaitStatus::Exited(tid, code) if tid == self.pid => {
                    info!(pid = %tid, code, "target exited");
                    self.alive = false;
                    return Ok(Some(DebuggerEvent::Exited { code: Some(code) }));
                }
                WaitStatus::Signaled(tid, signal, _) if tid == self.pid => {
                    info!(pid = %tid, %signal, "target killed by signal");
                    self.alive = false;
                    return Ok(Some(DebuggerEvent::Exited { code: None }));
                }
                WaitStatus::Exited(tid, _) | WaitStatus::Signaled(tid, _, _) => {
                    trace!(%tid, "thread exited");
                    self.threads.remove(tid);
                }
                WaitStatus::Stopped(tid, Signal::SIGSTOP) if self.threads.absorb_sigstop(tid) => {
                    trace!(%tid, "thread attached");
                    resume(tid, None)?;
                }
                WaitStatus::Stopped(tid, signal) if signals.stops(signal) => {
                    debug!(%tid, %signal, "target stopped by signal");
                    self.reported = Some((tid, Some(signal)));
                    return Ok(Some(DebuggerEvent::SignalStop {
                        signal: signal as i32,
                        thread: Some(thread_id(tid)),
                    }));
                }
                WaitStatus::Stopped(tid, signal) => {
                    trace!(%tid, %signal, "passing signal to target");
                    resume(tid, Some(signal))?;
                }
                WaitStatus::PtraceEvent(tid, _, event) => {
                    self.ptrace_event(tid, event)?;
                    resume(tid, None)?;
                }
                WaitStatus::PtraceSyscall(tid) | WaitStatus::Continued(tid) => resume(tid, None)?,
                WaitStatus::StillAlive => {}
            }
        }
    }

    fn ptrace_event(&mut self, tid: Pid, event: libc::c_int) -> Result<()>
    {
        match event {
            libc::PTRACE_EVENT_CLONE => {
                let raw = ptrace::getevent(tid)?;
                let new_tid = Pid::from_raw(i32::try_from(raw).map_err(|_| Errno::EINVAL)?);
                debug!(parent = %tid, thread = %new_tid, "new thread");
                self.threads.announced(new_tid);
            }
            libc::PTRACE_EVENT_EXEC => {
                debug!(pid = %self.pid, "target called execve");
                self.threads.retain_only(self.pid);
            }
            _ => trace!(%tid, event, "ignoring ptrace event"),
        }
        Ok(())
    }

    /// Stop every thread except `stopped` so their registers can be read.
    fn halt_other_threads(&mut self, stopped: Pid) -> Result<()>
    {
        for tid in self.threads.tids() {
            if tid == stopped || self.halted.iter().any(|(halted, _)| *halted == tid) {
                continue;
            }

            match tgkill(self.pid, tid, Signal::SIGSTOP) {
                Ok(()) => {}
                Err(DebuggerError::Ptrace(Errno::ESRCH)) => {
                    self.threads.remove(tid);
                    continue;
                }
                Err(err) => return Err(err),
            }

            match waitpid(tid, Some(WaitPidFlag::__WALL))? {
                WaitStatus::Stopped(_, Signal::SIGSTOP) => self.halted.push((tid, None)),
                WaitStatus::Stopped(_, signal) => {
                    // Our SIGSTOP is still queued behind this one.
                    self.threads.expect_stop(tid);
                    self.halted.push((tid, Some(signal)));
                }
                WaitStatus::PtraceEvent(_, _, event) => {
                    self.ptrace_event(tid, event)?;
                    self.threads.expect_stop(tid);
                    self.halted.push((tid, None));
                }
                WaitStatus::Exited(..) | WaitStatus::Signaled(..) => self.threads.remove(tid),
                other => trace!(%tid, ?other, "unexpected status while halting thread"),
            }
        }
        Ok(())
    }

    fn backtrace(&mut self, pagination: bool) -> Result<()>
    {
        let Some((stopped, _)) = self.reported else {
            return Err(DebuggerError::NotStopped);
        };
        self.halt_other_threads(stopped)?;

        let mut symbols = SymbolCache::new(read_maps(ProcessId(self.pid.as_raw().unsigned_abs()))?);
        let memory = PtraceMemory::new(stopped);
        let unwinder = StackUnwinder::new(Architecture::current(), &memory);

        let mut backtrace = Backtrace::default();
        for (tid, number) in self.threads.by_number_desc() {
            let thread = thread_id(tid);
            let mut entry = ThreadBacktrace {
                number,
                thread,
                frames: Vec::new(),
                error: None,
            };
            match read_registers(tid) {
                Ok(regs) => {
                    entry.frames = unwinder.unwind(thread, &regs, &mut symbols);
                    for frame in &mut entry.frames {
                        symbols.symbolicate(frame);
                    }
                }
                Err(err) => {
                    warn!(%tid, "cannot read registers: {err}");
                    entry.error = Some(err.to_string());
                }
            }
            backtrace.threads.push(entry);
        }

        let lines = backtrace.render();
        Pager::for_stdout(pagination).write_lines(&mut io::stdout().lock(), &mut io::stdin().lock(), &lines)?;
        Ok(())
    }

    fn kill(&mut self) -> Result<()>
    {
        match signal::kill(self.pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => return Err(err.into()),
        }

        loop {
            match waitpid(any_thread(), Some(WaitPidFlag::__WALL)) {
                Ok(WaitStatus::Exited(tid, _) | WaitStatus::Signaled(tid, _, _)) if tid == self.pid => break,
                Ok(_) | Err(Errno::EINTR) => {}
                Err(Errno::ECHILD) => break,
                Err(err) => return Err(err.into()),
            }
        }

        self.alive = false;
        self.reported = None;
        self.halted.clear();
        info!(pid = %self.pid, "target killed");
        Ok(())
    }
}

/// Linux debug session
///
/// One session launches and traces one program. See [`crate::session::DebugSession`]
/// for the lifecycle.
#[derive(Default)]
pub struct LinuxSession
{
    settings: SessionSettings,
    signals: SignalTable,
    target: Option<Target>,
}

impl LinuxSession
{
    /// New session with default settings and no target.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn target_mut(&mut self) -> Result<&mut Target>
    {
        self.target.as_mut().ok_or(DebuggerError::NotAttached)
    }
}

impl SessionCommands for LinuxSession
{
    fn backtrace_all_threads(&mut self) -> Result<()>
    {
        let pagination = self.settings.pagination;
        let target = self.target_mut()?;
        if !target.alive {
            return Err(DebuggerError::NotAttached);
        }
        target.backtrace(pagination)
    }
}

impl DebugSession for LinuxSession
{
    fn set_option(&mut self, option: SessionOption) -> Result<()>
    {
        if self.target.is_some() {
            return Err(DebuggerError::InvalidArgument(format!(
                "{option:?} must be set before the target is launched"
            )));
        }

        match option {
            SessionOption::Confirm(on) => self.settings.confirm = on,
            SessionOption::Pagination(on) => self.settings.pagination = on,
            SessionOption::DisableRandomization(on) => self.settings.disable_randomization = on,
        }
        Ok(())
    }

    fn launch(&mut self, program: &str, args: &[String]) -> Result<ProcessId>
    {
        if self.target.is_some() {
            return Err(DebuggerError::InvalidArgument("target already launched".into()));
        }
        if program.is_empty() {
            return Err(DebuggerError::InvalidArgument("program path is empty".into()));
        }

        // Ctrl-C belongs to the target; the launcher waits for its outcome.
        // SAFETY: installs SIG_IGN, no handler code runs.
        unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) }?;

        info!("Launching process: {} with args: {:?}", program, args);
        let pid = spawn_traced(program, args, self.settings.disable_randomization)?;

        self.target = Some(Target {
            pid,
            threads: ThreadList::new(pid),
            reported: Some((pid, None)),
            halted: Vec::new(),
            alive: true,
        });
        Ok(ProcessId(pid.as_raw().unsigned_abs()))
    }

    fn next_event(&mut self) -> Result<Option<DebuggerEvent>>
    {
        let Self { signals, target, .. } = self;
        let target = target.as_mut().ok_or(DebuggerError::NotAttached)?;
        if !target.alive {
            return Ok(None);
        }

        target.resume_stopped()?;
        target.wait_event(signals)
    }

    fn is_alive(&self) -> bool
    {
        self.target.as_ref().is_some_and(|target| target.alive)
    }

    fn quit(&mut self) -> Result<()>
    {
        let confirm_quit = self.settings.confirm;
        let Some(target) = self.target.as_mut().filter(|target| target.alive) else {
            return Ok(());
        };

        if confirm_quit && io::stdin().is_terminal() {
            let question = format!(
                "A debugging session is active.\n\n\tInferior 1 [process {}] will be killed.\n\nQuit anyway?",
                target.pid
            );
            if !confirm(&mut io::stdin().lock(), &mut io::stdout().lock(), &question)? {
                return Err(DebuggerError::QuitDeclined);
            }
        }

        target.kill()
    }

    fn as_commands(&mut self) -> &mut dyn SessionCommands
    {
        self
    }
}

impl Drop for LinuxSession
{
    fn drop(&mut self)
    {
        if let Some(target) = self.target.as_mut().filter(|target| target.alive) {
            if let Err(err) = target.kill() {
                warn!(pid = %target.pid, "failed to kill target on drop: {err}");
            }
        }
    }
}
