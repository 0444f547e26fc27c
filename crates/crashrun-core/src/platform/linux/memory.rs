//! Word-sized reads of target memory through ptrace.

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::error::{DebuggerError, Result};
use crate::types::Address;
use crate::unwind::MemoryAccess;

/// Reads memory through a stopped thread of the target.
pub(crate) struct PtraceMemory
{
    tid: Pid,
}

impl PtraceMemory
{
    pub(crate) fn new(tid: Pid) -> Self
    {
        Self { tid }
    }
}

impl MemoryAccess for PtraceMemory
{
    fn read_u64(&self, address: Address) -> Result<u64>
    {
        let word = ptrace::read(self.tid, address.value() as ptrace::AddressType).map_err(|err| {
            DebuggerError::MemoryReadFailed {
                address: address.value(),
                details: err.to_string(),
            }
        })?;
        Ok(u64::from_ne_bytes(word.to_ne_bytes()))
    }
}
