//! CPU register snapshot used for unwinding.

use super::Address;

/// The registers a stack walk starts from
///
/// Only the program counter, stack pointer, frame pointer and (on ARM64) the
/// link register are kept. Platform backends fill this from the full
/// `user_regs_struct`.
///
/// ## Mapping
///
/// | field | x86-64 | ARM64 |
/// |-------|--------|-------|
/// | `pc`  | RIP    | PC    |
/// | `sp`  | RSP    | SP    |
/// | `fp`  | RBP    | X29   |
/// | `lr`  | -      | X30   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers
{
    /// Program counter
    pub pc: Address,
    /// Stack pointer
    pub sp: Address,
    /// Frame pointer
    pub fp: Address,
    /// Link register (ARM64 only)
    pub lr: Option<Address>,
}

impl Registers
{
    /// Create an all-zero register set
    pub fn new() -> Self
    {
        Self::default()
    }
}
