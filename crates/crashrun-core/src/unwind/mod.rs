//! # Stack unwinding
//!
//! Recovers the chain of callers of a stopped thread from its registers and
//! stack memory.
//!
//! Each step first looks for call frame information in the image covering
//! the pc (see [`cfi`]). Only when no FDE covers it does the walk fall back
//! to the saved frame-pointer chain, and for an ARM64 leaf to the link
//! register.

pub mod cfi;

use gimli::{CfaRule, Register, RegisterRule};
use tracing::trace;

use self::cfi::{frame_pointer_register, return_register, CfiRow};
use crate::error::Result;
use crate::symbols::SymbolCache;
use crate::types::{Address, Architecture, FrameStatus, Registers, StackFrame, ThreadId};

/// Hard cap on frames per thread, guards against cyclic frame chains.
pub const MAX_FRAMES: usize = 256;

/// Minimal memory accessor required for stack unwinding.
pub trait MemoryAccess
{
    /// Read one native-endian 64-bit word at `address`.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailed` when the address isn't mapped in the target.
    fn read_u64(&self, address: Address) -> Result<u64>;
}

/// Result of looking up CFI for one frame.
enum CfiStep
{
    /// The caller's registers.
    Caller(Registers),
    /// An FDE covers the pc but marks it as the outermost frame.
    Outermost,
    /// No usable unwind info; try the frame pointer.
    Unavailable,
}

/// Stack walker for a stopped thread
///
/// Uses `.eh_frame` unwind tables when the image has them. Without them,
/// both supported architectures keep `[saved fp, return address]` at the
/// address held in the frame pointer (`rbp` / `x29`).
pub struct StackUnwinder<'a, M>
{
    architecture: Architecture,
    memory: &'a M,
}

impl<'a, M: MemoryAccess> StackUnwinder<'a, M>
{
    /// Unwinder reading the target's stack through `memory`, capped at [`MAX_FRAMES`].
    pub fn new(architecture: Architecture, memory: &'a M) -> Self
    {
        Self { architecture, memory }
    }

    /// Walk the stack of `thread`, innermost frame first.
    ///
    /// `symbols` supplies the images whose unwind tables are consulted.
    /// Never fails: an unreadable link ends the walk with what was collected.
    pub fn unwind(&self, thread: ThreadId, regs: &Registers, symbols: &mut SymbolCache) -> Vec<StackFrame>
    {
        let mut frames = Vec::new();
        if regs.pc == Address::ZERO {
            return frames;
        }

        frames.push(StackFrame::bare(thread, 0, regs.pc, regs.sp, regs.fp, FrameStatus::Registers));

        let mut cursor = *regs;
        while frames.len() < MAX_FRAMES {
            // Caller frames hold return addresses, which may sit just past the function's end.
            let lookup = if frames.len() > 1 { cursor.pc - 1 } else { cursor.pc };

            let (next, status) = match self.cfi_step(&cursor, lookup, symbols) {
                CfiStep::Caller(next) => (next, FrameStatus::Cfi),
                CfiStep::Outermost => break,
                CfiStep::Unavailable => {
                    if let Some(next) = self.frame_pointer_step(&cursor) {
                        (next, FrameStatus::FramePointer)
                    } else if frames.len() == 1 {
                        let Some(next) = self.link_register_step(&cursor) else {
                            break;
                        };
                        (next, FrameStatus::LinkRegister)
                    } else {
                        break;
                    }
                }
            };

            frames.push(StackFrame::bare(thread, frames.len(), next.pc, next.sp, next.fp, status));

            if !made_progress(&cursor, &next, status) {
                break;
            }
            cursor = next;
        }

        frames
    }

    fn cfi_step(&self, regs: &Registers, lookup: Address, symbols: &mut SymbolCache) -> CfiStep
    {
        let Some(image) = symbols.image_for(lookup) else {
            return CfiStep::Unavailable;
        };
        let Some(info) = image.call_frame_info() else {
            return CfiStep::Unavailable;
        };

        let row = match info.row_for(image.bias(), lookup.value(), self.architecture) {
            Ok(Some(row)) => row,
            Ok(None) => return CfiStep::Unavailable,
            Err(err) => {
                trace!(pc = %lookup, path = image.path(), "unusable unwind info: {err}");
                return CfiStep::Unavailable;
            }
        };

        match self.apply_row(regs, &row) {
            Ok(step) => step,
            Err(err) => {
                trace!(pc = %lookup, "CFI step failed: {err}");
                CfiStep::Unavailable
            }
        }
    }

    /// Compute the caller's registers from an unwind row.
    fn apply_row(&self, regs: &Registers, row: &CfiRow) -> Result<CfiStep>
    {
        let CfaRule::RegisterAndOffset { register, offset } = &row.cfa else {
            return Ok(CfiStep::Unavailable);
        };
        let Some(base) = self.register_value(regs, *register) else {
            return Ok(CfiStep::Unavailable);
        };
        let cfa = base.wrapping_add_signed(*offset);

        // An ARM64 leaf leaves x30 without a rule while its return address is still live in it.
        let return_address = match row.return_address {
            RegisterRule::Undefined if regs.lr.is_none() => return Ok(CfiStep::Outermost),
            ref rule => self.evaluate_rule(rule, return_register(self.architecture), regs, cfa)?,
        };
        let Some(pc) = return_address.filter(|&pc| pc != 0) else {
            return Ok(CfiStep::Outermost);
        };

        let fp = self
            .evaluate_rule(&row.frame_pointer, frame_pointer_register(self.architecture), regs, cfa)?
            .unwrap_or(regs.fp.value());

        Ok(CfiStep::Caller(Registers {
            pc: Address::from(strip_pointer_auth(self.architecture, pc)),
            sp: Address::from(cfa),
            fp: Address::from(fp),
            lr: None,
        }))
    }

    /// Caller's value of `register` under `rule`. `None` when it can't be recovered.
    fn evaluate_rule(&self, rule: &RegisterRule<usize>, register: Register, regs: &Registers, cfa: u64) -> Result<Option<u64>>
    {
        match rule {
            RegisterRule::Offset(offset) => self.memory.read_u64(Address::from(cfa.wrapping_add_signed(*offset))).map(Some),
            RegisterRule::ValOffset(offset) => Ok(Some(cfa.wrapping_add_signed(*offset))),
            RegisterRule::Register(other) => Ok(self.register_value(regs, *other)),
            RegisterRule::SameValue | RegisterRule::Undefined => Ok(self.register_value(regs, register)),
            _ => Ok(None),
        }
    }

    /// The few DWARF registers a [`Registers`] snapshot carries.
    fn register_value(&self, regs: &Registers, register: Register) -> Option<u64>
    {
        let value = match (self.architecture, register.0) {
            (Architecture::X86_64, 7) | (Architecture::Arm64, 31) => regs.sp,
            (Architecture::X86_64, 6) | (Architecture::Arm64, 29) => regs.fp,
            (Architecture::X86_64, 16) => regs.pc,
            (Architecture::Arm64, 30) => regs.lr?,
            _ => return None,
        };
        Some(value.value())
    }

    fn frame_pointer_step(&self, regs: &Registers) -> Option<Registers>
    {
        let fp = regs.fp;
        if fp == Address::ZERO || !fp.is_aligned(u64::from(self.architecture.pointer_size_bytes())) {
            return None;
        }

        let saved_fp = self.memory.read_u64(fp).ok()?;
        let return_addr = self.memory.read_u64(fp.checked_add(8)?).ok()?;
        if return_addr == 0 {
            return None;
        }

        Some(Registers {
            pc: Address::from(strip_pointer_auth(self.architecture, return_addr)),
            sp: fp.checked_add(16)?,
            fp: Address::from(saved_fp),
            lr: None,
        })
    }

    /// ARM64 leaf functions may not have set up `x29` yet; the caller is still in `x30`.
    fn link_register_step(&self, regs: &Registers) -> Option<Registers>
    {
        if self.architecture != Architecture::Arm64 {
            return None;
        }

        let lr = regs.lr?;
        if lr == Address::ZERO || lr == regs.pc {
            return None;
        }

        Some(Registers {
            pc: Address::from(strip_pointer_auth(self.architecture, lr.value())),
            sp: regs.sp,
            fp: Address::ZERO,
            lr: None,
        })
    }
}

/// Whether `next` is a plausible caller of `cursor`; the stack grows down.
fn made_progress(cursor: &Registers, next: &Registers, status: FrameStatus) -> bool
{
    match status {
        FrameStatus::Cfi => next.sp > cursor.sp || (next.sp == cursor.sp && next.pc != cursor.pc),
        FrameStatus::FramePointer => next.fp > cursor.fp,
        FrameStatus::LinkRegister => true,
        FrameStatus::Registers => false,
    }
}

/// Drop ARM64 pointer-authentication bits from a return address.
fn strip_pointer_auth(architecture: Architecture, address: u64) -> u64
{
    match architecture {
        // 48-bit user address space
        Architecture::Arm64 => address & 0x0000_ffff_ffff_ffff,
        _ => address,
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;
    use crate::error::DebuggerError;

    struct FakeMemory(HashMap<u64, u64>);

    impl MemoryAccess for FakeMemory
    {
        fn read_u64(&self, address: Address) -> Result<u64>
        {
            self.0
                .get(&address.value())
                .copied()
                .ok_or_else(|| DebuggerError::MemoryReadFailed {
                    address: address.value(),
                    details: "unmapped".into(),
                })
        }
    }

    fn no_images() -> SymbolCache
    {
        SymbolCache::new(Vec::new())
    }

    fn regs(pc: u64, sp: u64, fp: u64) -> Registers
    {
        Registers {
            pc: Address::from(pc),
            sp: Address::from(sp),
            fp: Address::from(fp),
            lr: None,
        }
    }

    #[test]
    fn test_walks_frame_pointer_chain()
    {
        // fp 0x7000 -> 0x7100 -> 0 (outermost)
        let memory = FakeMemory(HashMap::from([
            (0x7000, 0x7100),
            (0x7008, 0x4000_1234),
            (0x7100, 0),
            (0x7108, 0x4000_5678),
        ]));
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let frames = unwinder.unwind(ThreadId::from(1), &regs(0x4000_0010, 0x6ff0, 0x7000), &mut no_images());

        let pcs: Vec<u64> = frames.iter().map(|frame| frame.pc.value()).collect();
        assert_eq!(pcs, vec![0x4000_0010, 0x4000_1234, 0x4000_5678]);
        assert_eq!(frames[0].status, FrameStatus::Registers);
        assert_eq!(frames[1].status, FrameStatus::FramePointer);
        assert_eq!(frames[1].sp, Address::from(0x7010));
        assert_eq!(frames.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_stops_on_unreadable_memory()
    {
        let memory = FakeMemory(HashMap::new());
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let frames = unwinder.unwind(ThreadId::from(1), &regs(0x4000_0010, 0x6ff0, 0x7000), &mut no_images());
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_stops_on_cyclic_chain()
    {
        let memory = FakeMemory(HashMap::from([(0x7000, 0x7000), (0x7008, 0x4000_1234)]));
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let frames = unwinder.unwind(ThreadId::from(1), &regs(0x4000_0010, 0x6ff0, 0x7000), &mut no_images());
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_respects_max_frames()
    {
        let mut words = HashMap::new();
        for i in 0..300u64 {
            let fp = 0x10_000 + i * 0x20;
            words.insert(fp, fp + 0x20);
            words.insert(fp + 8, 0x4000_0000 + i);
        }
        let memory = FakeMemory(words);
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let frames = unwinder.unwind(ThreadId::from(1), &regs(0x4000_0010, 0xfff0, 0x10_000), &mut no_images());
        assert_eq!(frames.len(), MAX_FRAMES);
    }

    #[test]
    fn test_zero_pc_yields_no_frames()
    {
        let memory = FakeMemory(HashMap::new());
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        assert!(unwinder.unwind(ThreadId::from(1), &Registers::new(), &mut no_images()).is_empty());
    }

    #[test]
    fn test_arm64_leaf_uses_link_register()
    {
        let memory = FakeMemory(HashMap::new());
        let unwinder = StackUnwinder::new(Architecture::Arm64, &memory);
        let mut leaf = regs(0x4000_0010, 0x6ff0, 0);
        leaf.lr = Some(Address::from(0x4000_0200));

        let frames = unwinder.unwind(ThreadId::from(1), &leaf, &mut no_images());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].pc, Address::from(0x4000_0200));
        assert_eq!(frames[1].status, FrameStatus::LinkRegister);
    }

    #[test]
    fn test_cfi_row_drives_step()
    {
        // rsp-based CFA, return address at CFA-8, rbp saved at CFA-16
        let memory = FakeMemory(HashMap::from([(0x7ff8, 0x4000_1234), (0x7ff0, 0x7400)]));
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let row = CfiRow {
            cfa: CfaRule::RegisterAndOffset {
                register: Register(7),
                offset: 0x20,
            },
            return_address: RegisterRule::Offset(-8),
            frame_pointer: RegisterRule::Offset(-16),
        };

        let Ok(CfiStep::Caller(next)) = unwinder.apply_row(&regs(0x4000_0010, 0x7fe0, 0x1), &row) else {
            panic!("expected a caller frame");
        };
        assert_eq!(next.pc, Address::from(0x4000_1234));
        assert_eq!(next.sp, Address::from(0x8000));
        assert_eq!(next.fp, Address::from(0x7400));
    }

    #[test]
    fn test_cfi_undefined_return_address_is_outermost()
    {
        let memory = FakeMemory(HashMap::new());
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let row = CfiRow {
            cfa: CfaRule::RegisterAndOffset {
                register: Register(7),
                offset: 8,
            },
            return_address: RegisterRule::Undefined,
            frame_pointer: RegisterRule::SameValue,
        };
        assert!(matches!(
            unwinder.apply_row(&regs(0x4000_0010, 0x7fe0, 0), &row),
            Ok(CfiStep::Outermost)
        ));
    }

    #[test]
    fn test_cfi_unsaved_frame_pointer_is_kept()
    {
        let memory = FakeMemory(HashMap::from([(0x7fe0, 0x4000_2000)]));
        let unwinder = StackUnwinder::new(Architecture::X86_64, &memory);
        let row = CfiRow {
            cfa: CfaRule::RegisterAndOffset {
                register: Register(7),
                offset: 8,
            },
            return_address: RegisterRule::Offset(-8),
            frame_pointer: RegisterRule::Undefined,
        };
        let Ok(CfiStep::Caller(next)) = unwinder.apply_row(&regs(0x4000_0010, 0x7fe0, 0x7500), &row) else {
            panic!("expected a caller frame");
        };
        assert_eq!(next.fp, Address::from(0x7500));
        assert_eq!(next.sp, Address::from(0x7fe8));
    }

    #[test]
    fn test_arm64_leaf_row_reads_link_register()
    {
        let memory = FakeMemory(HashMap::new());
        let unwinder = StackUnwinder::new(Architecture::Arm64, &memory);
        let row = CfiRow {
            cfa: CfaRule::RegisterAndOffset {
                register: Register(31),
                offset: 0,
            },
            return_address: RegisterRule::Undefined,
            frame_pointer: RegisterRule::Undefined,
        };
        let mut leaf = regs(0x4000_0010, 0x6ff0, 0x7000);
        leaf.lr = Some(Address::from(0x4000_0200));

        let Ok(CfiStep::Caller(next)) = unwinder.apply_row(&leaf, &row) else {
            panic!("expected a caller frame");
        };
        assert_eq!(next.pc, Address::from(0x4000_0200));
        assert_eq!(next.sp, Address::from(0x6ff0));
        assert!(made_progress(&leaf, &next, FrameStatus::Cfi));
    }

    /// Reads this process's own memory, limited to readable mappings.
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    struct OwnMemory(Vec<crate::types::MemoryRegion>);

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    impl MemoryAccess for OwnMemory
    {
        fn read_u64(&self, address: Address) -> Result<u64>
        {
            let mapped = address.checked_add(8).is_some_and(|end| {
                self.0
                    .iter()
                    .any(|region| region.is_readable() && region.contains(address) && end <= region.end)
            });
            if !mapped {
                return Err(DebuggerError::MemoryReadFailed {
                    address: address.value(),
                    details: "unmapped".into(),
                });
            }
            // SAFETY: the range lies inside a readable mapping of this process.
            Ok(unsafe { std::ptr::read_unaligned(address.value() as *const u64) })
        }
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[inline(never)]
    fn unwind_here() -> Vec<StackFrame>
    {
        let (pc, sp, fp): (u64, u64, u64);
        // SAFETY: only copies registers.
        unsafe {
            std::arch::asm!(
                "lea {pc}, [rip]",
                "mov {sp}, rsp",
                "mov {fp}, rbp",
                pc = out(reg) pc,
                sp = out(reg) sp,
                fp = out(reg) fp,
                options(nomem, nostack, preserves_flags),
            );
        }

        let regions = crate::symbols::maps::read_maps(crate::types::ProcessId(std::process::id())).unwrap();
        let memory = OwnMemory(regions.clone());
        let mut symbols = SymbolCache::new(regions);
        let current = Registers {
            pc: Address::from(pc),
            sp: Address::from(sp),
            fp: Address::from(fp),
            lr: None,
        };

        let mut frames = StackUnwinder::new(Architecture::X86_64, &memory).unwind(ThreadId::from(1), &current, &mut symbols);
        for frame in &mut frames {
            symbols.symbolicate(frame);
        }
        frames
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[inline(never)]
    fn call_unwind_here() -> Vec<StackFrame>
    {
        std::hint::black_box(unwind_here())
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[test]
    fn test_unwinds_own_stack_through_cfi()
    {
        let frames = call_unwind_here();
        let names: Vec<String> = frames
            .iter()
            .map(|frame| frame.symbol.as_ref().map_or_else(String::new, |name| name.display_name().to_string()))
            .collect();

        let inner = names.iter().position(|name| name.contains("unwind_here") && !name.contains("call_unwind_here"));
        let outer = names.iter().position(|name| name.contains("call_unwind_here"));
        let (Some(inner), Some(outer)) = (inner, outer) else {
            panic!("expected both test frames in {names:?}");
        };
        assert!(inner < outer, "callee must come before caller: {names:?}");
        assert!(frames[1..].iter().any(|frame| frame.status == FrameStatus::Cfi));
        assert!(names.iter().any(|name| name.contains("test_unwinds_own_stack_through_cfi")));
    }
}
