//! Process, thread, and memory region types.

use std::fmt;

use super::Address;

/// Process identifier (PID)
///
/// A newtype over the kernel's PID so a PID can't be confused with an exit
/// code or a signal number.
///
/// ## Example
///
/// ```rust
/// use crashrun_core::types::ProcessId;
///
/// let pid = ProcessId::from(12345);
/// assert_eq!(u32::from(pid), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier
///
/// On Linux this is the kernel thread id (the LWP number). The thread-group
/// leader's id equals the process id.
///
/// ```rust
/// use crashrun_core::types::ThreadId;
///
/// let thread = ThreadId::from(12345);
/// assert_eq!(thread.raw(), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Raw `u64` representation of the thread identifier
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl From<ProcessId> for ThreadId
{
    fn from(pid: ProcessId) -> Self
    {
        Self(u64::from(pid.0))
    }
}

/// Memory mapping in the target process
///
/// One line of `/proc/<pid>/maps`: an address range, its permissions, the
/// offset into the backing file, and the file path or pseudo-name such as
/// `[stack]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion
{
    /// Start address (inclusive)
    pub start: Address,
    /// End address (exclusive)
    pub end: Address,
    /// Permission string, e.g. `"r-xp"`
    pub permissions: String,
    /// Offset of `start` within the backing file
    pub offset: u64,
    /// Backing file path or pseudo-name (`[heap]`, `[vdso]`), if any
    pub path: Option<String>,
}

impl MemoryRegion
{
    /// Create a new memory region
    ///
    /// No validation is done on `end > start`; `size()` saturates to 0.
    pub fn new(start: Address, end: Address, permissions: String, offset: u64, path: Option<String>) -> Self
    {
        Self {
            start,
            end,
            permissions,
            offset,
            path,
        }
    }

    /// Size of the region in bytes
    pub fn size(&self) -> u64
    {
        self.end.value().saturating_sub(self.start.value())
    }

    /// Check if the region is readable
    pub fn is_readable(&self) -> bool
    {
        self.permissions.starts_with('r')
    }

    /// Check if the region is executable
    pub fn is_executable(&self) -> bool
    {
        self.permissions.contains('x')
    }

    /// Whether the region maps a file on disk (as opposed to `[stack]`, anonymous memory, ...)
    pub fn is_file_backed(&self) -> bool
    {
        self.path.as_deref().is_some_and(|path| path.starts_with('/'))
    }

    /// Check if an address lies within `[start, end)`
    ///
    /// ```rust
    /// use crashrun_core::types::{Address, MemoryRegion};
    ///
    /// let region = MemoryRegion::new(Address::from(0x1000), Address::from(0x2000), "r-xp".into(), 0, None);
    /// assert!(region.contains(Address::from(0x1000)));
    /// assert!(!region.contains(Address::from(0x2000)));
    /// ```
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.start && address < self.end
    }
}

/// CPU architecture of the debug target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 64-bit ARM
    Arm64,
    /// 64-bit x86
    X86_64,
    /// Any other architecture; registers can't be read
    Unknown(&'static str),
}

impl Architecture
{
    /// Architecture of the running launcher binary
    ///
    /// The target is assumed to match, since it is spawned on the same host.
    pub const fn current() -> Self
    {
        #[cfg(target_arch = "aarch64")]
        {
            Architecture::Arm64
        }

        #[cfg(target_arch = "x86_64")]
        {
            Architecture::X86_64
        }

        #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
        {
            Architecture::Unknown(std::env::consts::ARCH)
        }
    }

    /// Size of a pointer in bytes for this architecture.
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u8
    {
        8
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Unknown(name) => write!(f, "{name}"),
        }
    }
}
