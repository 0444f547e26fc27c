//! Stack frame types.

use super::symbols::{SourceLocation, SymbolName};
use super::{Address, ThreadId};

/// Indicates how the frame was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus
{
    /// Read directly from the thread's registers (frame #0).
    Registers,
    /// Recovered from the image's `.eh_frame` unwind table.
    Cfi,
    /// Recovered by following the saved frame-pointer chain.
    FramePointer,
    /// Recovered from the ARM64 link register; the caller's own frame may be missing.
    LinkRegister,
}

/// One physical stack frame.
#[derive(Debug, Clone)]
pub struct StackFrame
{
    /// Owning thread.
    pub thread: ThreadId,
    /// Position in the trace, 0 = innermost.
    pub index: usize,
    /// Program counter for this frame.
    pub pc: Address,
    /// Stack pointer snapshot.
    pub sp: Address,
    /// Frame pointer snapshot.
    pub fp: Address,
    /// Best-effort symbol for the frame.
    pub symbol: Option<SymbolName>,
    /// Best-effort source location.
    pub location: Option<SourceLocation>,
    /// Path of the mapped image containing `pc`.
    pub module: Option<String>,
    /// How the frame was recovered.
    pub status: FrameStatus,
}

impl StackFrame
{
    /// A frame with no symbol information yet.
    pub fn bare(thread: ThreadId, index: usize, pc: Address, sp: Address, fp: Address, status: FrameStatus) -> Self
    {
        Self {
            thread,
            index,
            pc,
            sp,
            fp,
            symbol: None,
            location: None,
            module: None,
            status,
        }
    }
}
