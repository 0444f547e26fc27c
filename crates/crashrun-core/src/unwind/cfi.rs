//! Call frame information from `.eh_frame` / `.eh_frame_hdr`.
//!
//! Every ELF image built with unwind tables describes, per instruction range,
//! how to compute the canonical frame address (CFA) and where the caller's
//! registers were saved. That works for code compiled without frame
//! pointers, which is most of libc.

use gimli::{
    BaseAddresses, CfaRule, EhFrame, EhFrameHdr, Reader, Register, RegisterRule, RunTimeEndian, UnwindContext,
    UnwindSection, UnwindTableRow,
};
use object::{Object, ObjectSection};

use crate::error::{DebuggerError, Result};
use crate::types::Architecture;

/// One section copied out of the image, at its link-time address.
struct FrameSection
{
    address: u64,
    data: Vec<u8>,
}

impl FrameSection
{
    fn read(file: &object::File<'_>, name: &str) -> Option<Self>
    {
        let section = file.section_by_name(name)?;
        let data = section.data().ok()?;
        if data.is_empty() {
            return None;
        }
        Some(Self {
            address: section.address(),
            data: data.to_vec(),
        })
    }
}

/// Unwind tables of one image
pub struct CallFrameInfo
{
    endian: RunTimeEndian,
    eh_frame: FrameSection,
    eh_frame_hdr: Option<FrameSection>,
    text_address: u64,
}

/// The parts of an unwind row needed to step one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfiRow
{
    /// How to compute the CFA.
    pub cfa: CfaRule<usize>,
    /// Where the return address was saved.
    pub return_address: RegisterRule<usize>,
    /// Where the caller's frame pointer was saved.
    pub frame_pointer: RegisterRule<usize>,
}

impl CfiRow
{
    fn from_row(row: &UnwindTableRow<usize>, architecture: Architecture) -> Self
    {
        Self {
            cfa: row.cfa().clone(),
            return_address: row.register(return_register(architecture)),
            frame_pointer: row.register(frame_pointer_register(architecture)),
        }
    }
}

impl CallFrameInfo
{
    /// Copy the unwind sections out of a parsed image. `None` when it has no `.eh_frame`.
    pub fn from_object(file: &object::File<'_>) -> Option<Self>
    {
        let eh_frame = FrameSection::read(file, ".eh_frame")?;
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        Some(Self {
            endian,
            eh_frame,
            eh_frame_hdr: FrameSection::read(file, ".eh_frame_hdr"),
            text_address: file.section_by_name(".text").map_or(0, |section| section.address()),
        })
    }

    /// Unwind row covering the runtime address `pc`, for an image loaded at `bias`.
    ///
    /// The binary search table in `.eh_frame_hdr` is tried first, then a
    /// linear scan of `.eh_frame`. `Ok(None)` means no FDE covers `pc`.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the tables are malformed.
    pub fn row_for(&self, bias: u64, pc: u64, architecture: Architecture) -> Result<Option<CfiRow>>
    {
        let mut bases = BaseAddresses::default()
            .set_text(self.text_address.wrapping_add(bias))
            .set_eh_frame(self.eh_frame.address.wrapping_add(bias));
        if let Some(hdr) = &self.eh_frame_hdr {
            bases = bases.set_eh_frame_hdr(hdr.address.wrapping_add(bias));
        }

        let mut eh_frame = EhFrame::new(&self.eh_frame.data, self.endian);
        eh_frame.set_address_size(architecture.pointer_size_bytes());

        if let Some(hdr) = &self.eh_frame_hdr {
            let header = EhFrameHdr::new(&hdr.data, self.endian);
            if let Some(row) = row_from_hdr(&eh_frame, &header, &bases, pc, architecture)? {
                return Ok(Some(row));
            }
        }

        row_from_scan(&eh_frame, &bases, pc, architecture)
    }
}

fn row_from_hdr<R: Reader<Offset = usize>>(
    eh_frame: &EhFrame<R>,
    header: &EhFrameHdr<R>,
    bases: &BaseAddresses,
    pc: u64,
    architecture: Architecture,
) -> Result<Option<CfiRow>>
{
    let parsed = header
        .parse(bases, architecture.pointer_size_bytes())
        .map_err(|err| gimli_error("parse .eh_frame_hdr", err))?;
    let Some(table) = parsed.table() else {
        return Ok(None);
    };

    let pointer = match table.lookup(pc, bases) {
        Ok(pointer) => pointer,
        Err(gimli::Error::NoUnwindInfoForAddress) => return Ok(None),
        Err(err) => return Err(gimli_error("search .eh_frame_hdr", err)),
    };
    let offset = table
        .pointer_to_offset(pointer)
        .map_err(|err| gimli_error("resolve FDE pointer", err))?;
    let fde = eh_frame
        .partial_fde_from_offset(bases, offset)
        .and_then(|partial| partial.parse(|section, bases, cie| section.cie_from_offset(bases, cie)))
        .map_err(|err| gimli_error("parse FDE", err))?;

    if !fde.contains(pc) {
        return Ok(None);
    }

    let mut context = UnwindContext::<usize>::new();
    match fde.unwind_info_for_address(eh_frame, bases, &mut context, pc) {
        Ok(row) => Ok(Some(CfiRow::from_row(row, architecture))),
        Err(gimli::Error::NoUnwindInfoForAddress) => Ok(None),
        Err(err) => Err(gimli_error("evaluate CFI", err)),
    }
}

fn row_from_scan<R: Reader<Offset = usize>>(
    eh_frame: &EhFrame<R>,
    bases: &BaseAddresses,
    pc: u64,
    architecture: Architecture,
) -> Result<Option<CfiRow>>
{
    let mut entries = eh_frame.entries(bases);
    while let Some(entry) = entries.next().map_err(|err| gimli_error("scan .eh_frame", err))? {
        let gimli::CieOrFde::Fde(partial) = entry else {
            continue;
        };
        let fde = partial
            .parse(|section, bases, cie| section.cie_from_offset(bases, cie))
            .map_err(|err| gimli_error("parse FDE", err))?;
        if !fde.contains(pc) {
            continue;
        }

        let mut context = UnwindContext::<usize>::new();
        return match fde.unwind_info_for_address(eh_frame, bases, &mut context, pc) {
            Ok(row) => Ok(Some(CfiRow::from_row(row, architecture))),
            Err(gimli::Error::NoUnwindInfoForAddress) => Ok(None),
            Err(err) => Err(gimli_error("evaluate CFI", err)),
        };
    }
    Ok(None)
}

/// DWARF register holding the return address: RA on x86-64, x30 on ARM64.
pub fn return_register(architecture: Architecture) -> Register
{
    match architecture {
        Architecture::Arm64 => Register(30),
        _ => Register(16),
    }
}

/// DWARF register used as frame pointer: RBP on x86-64, x29 on ARM64.
pub fn frame_pointer_register(architecture: Architecture) -> Register
{
    match architecture {
        Architecture::Arm64 => Register(29),
        _ => Register(6),
    }
}

fn gimli_error(context: &str, err: gimli::Error) -> DebuggerError
{
    DebuggerError::InvalidArgument(format!("{context}: {err}"))
}
