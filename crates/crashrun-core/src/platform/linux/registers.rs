//! Register access for stopped threads.

use nix::unistd::Pid;

use crate::error::{DebuggerError, Result};
use crate::types::{Address, Registers};

fn read_failed(tid: Pid, details: impl ToString) -> DebuggerError
{
    DebuggerError::ReadRegistersFailed {
        thread: u64::try_from(tid.as_raw()).unwrap_or_default(),
        details: details.to_string(),
    }
}

/// Read pc/sp/fp of a stopped thread.
#[cfg(target_arch = "x86_64")]
pub(crate) fn read_registers(tid: Pid) -> Result<Registers>
{
    let regs = nix::sys::ptrace::getregs(tid).map_err(|err| read_failed(tid, err))?;
    Ok(Registers {
        pc: Address::from(regs.rip),
        sp: Address::from(regs.rsp),
        fp: Address::from(regs.rbp),
        lr: None,
    })
}

/// Read pc/sp/fp/lr of a stopped thread.
#[cfg(target_arch = "aarch64")]
pub(crate) fn read_registers(tid: Pid) -> Result<Registers>
{
    use std::mem;

    // SAFETY: user_regs_struct is plain old data.
    let mut regs: libc::user_regs_struct = unsafe { mem::zeroed() };
    let mut iov = libc::iovec {
        iov_base: (&mut regs as *mut libc::user_regs_struct).cast(),
        iov_len: mem::size_of::<libc::user_regs_struct>(),
    };

    // SAFETY: the kernel writes at most iov_len bytes into `regs`.
    let ret = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGSET,
            tid.as_raw(),
            libc::NT_PRSTATUS as usize as *mut libc::c_void,
            (&mut iov as *mut libc::iovec).cast::<libc::c_void>(),
        )
    };
    if ret == -1 {
        return Err(read_failed(tid, nix::errno::Errno::last()));
    }

    Ok(Registers {
        pc: Address::from(regs.pc),
        sp: Address::from(regs.sp),
        fp: Address::from(regs.regs[29]),
        lr: Some(Address::from(regs.regs[30])),
    })
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub(crate) fn read_registers(tid: Pid) -> Result<Registers>
{
    Err(read_failed(tid, format!("unsupported architecture {}", std::env::consts::ARCH)))
}
