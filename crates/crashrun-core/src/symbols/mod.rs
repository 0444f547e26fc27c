//! # Symbolication
//!
//! Turns runtime addresses of a live process into function names and source
//! locations.
//!
//! The process's memory map says which file backs an address. Each such ELF
//! image is parsed once with `object`. Its text symbols give function names
//! (the nearest symbol at or below the address). A lazily built `addr2line`
//! loader gives file and line when the image carries DWARF. Its unwind
//! tables are kept for the stack walker.

pub mod demangle;
pub mod maps;

use std::collections::HashMap;
use std::fs;

use object::{Object, ObjectSegment, ObjectSymbol, SymbolKind};
use once_cell::unsync::OnceCell;
use tracing::debug;

use self::demangle::make_symbol_name;
use crate::error::{DebuggerError, Result};
use crate::types::{Address, MemoryRegion, SourceLocation, StackFrame, SymbolName};
use crate::unwind::cfi::CallFrameInfo;

const PAGE_SIZE: u64 = 0x1000;

#[derive(Debug, Clone)]
struct ElfSymbol
{
    address: u64,
    size: u64,
    name: String,
}

/// A mapped ELF image with its symbol table
pub struct BinaryImage
{
    path: String,
    bias: u64,
    symbols: Vec<ElfSymbol>,
    unwind: Option<CallFrameInfo>,
    lines: OnceCell<Option<addr2line::Loader>>,
}

impl BinaryImage
{
    /// Parse the file at `path`, mapped so that its first byte sits at `base`.
    ///
    /// ## Errors
    ///
    /// `Io` if the file can't be read, `InvalidArgument` if it isn't an object file.
    pub fn load(path: &str, base: u64) -> Result<Self>
    {
        let data = fs::read(path)?;
        let file = object::File::parse(&*data)
            .map_err(|err| DebuggerError::InvalidArgument(format!("failed to parse {path}: {err}")))?;

        let first_vaddr = file
            .segments()
            .map(|segment| segment.address())
            .min()
            .unwrap_or(0)
            & !(PAGE_SIZE - 1);

        let mut symbols: Vec<ElfSymbol> = file
            .symbols()
            .chain(file.dynamic_symbols())
            .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.address() != 0)
            .filter_map(|symbol| {
                let name = symbol.name().ok()?;
                (!name.is_empty()).then(|| ElfSymbol {
                    address: symbol.address(),
                    size: symbol.size(),
                    name: name.to_string(),
                })
            })
            .collect();
        symbols.sort_by_key(|symbol| symbol.address);
        symbols.dedup_by_key(|symbol| symbol.address);

        let unwind = CallFrameInfo::from_object(&file);
        if unwind.is_none() {
            debug!(path, "image has no .eh_frame");
        }

        Ok(Self {
            path: path.to_string(),
            bias: base.wrapping_sub(first_vaddr),
            symbols,
            unwind,
            lines: OnceCell::new(),
        })
    }

    /// Path of the image on disk.
    pub fn path(&self) -> &str
    {
        &self.path
    }

    /// Difference between runtime and link-time addresses.
    pub fn bias(&self) -> u64
    {
        self.bias
    }

    pub fn call_frame_info(&self) -> Option<&CallFrameInfo>
    {
        self.unwind.as_ref()
    }

    /// Convert a runtime address to the address used inside the file.
    pub fn file_address(&self, address: Address) -> u64
    {
        address.value().wrapping_sub(self.bias)
    }

    /// Nearest text symbol covering `file_address`.
    pub fn symbol_for(&self, file_address: u64) -> Option<SymbolName>
    {
        let index = self.symbols.partition_point(|symbol| symbol.address <= file_address);
        let symbol = self.symbols.get(index.checked_sub(1)?)?;
        if symbol.size != 0 && file_address >= symbol.address.saturating_add(symbol.size) {
            return None;
        }
        Some(make_symbol_name(&symbol.name))
    }

    /// Source location of `file_address`, when the image has line tables.
    pub fn location_for(&self, file_address: u64) -> Option<SourceLocation>
    {
        let loader = self
            .lines
            .get_or_init(|| match addr2line::Loader::new(&self.path) {
                Ok(loader) => Some(loader),
                Err(err) => {
                    debug!(path = %self.path, "no line information: {err}");
                    None
                }
            })
            .as_ref()?;

        let location = loader.find_location(file_address).ok()??;
        Some(SourceLocation {
            file: location.file?.to_string(),
            line: location.line,
        })
    }
}

/// Symbol lookups for one process, with parsed images cached by path.
pub struct SymbolCache
{
    regions: Vec<MemoryRegion>,
    images: HashMap<String, Option<BinaryImage>>,
}

impl SymbolCache
{
    /// Cache over an already parsed memory map.
    #[must_use]
    pub fn new(regions: Vec<MemoryRegion>) -> Self
    {
        Self {
            regions,
            images: HashMap::new(),
        }
    }

    /// The mapping containing `address`, if any.
    pub fn region_for(&self, address: Address) -> Option<&MemoryRegion>
    {
        self.regions.iter().find(|region| region.contains(address))
    }

    /// Where the file at `path` starts in memory: the lowest mapping of it, minus its file offset.
    fn image_base(&self, path: &str) -> Option<u64>
    {
        self.regions
            .iter()
            .filter(|region| region.path.as_deref() == Some(path))
            .map(|region| region.start.value().wrapping_sub(region.offset))
            .min()
    }

    fn image(&mut self, path: &str) -> Option<&BinaryImage>
    {
        if !self.images.contains_key(path) {
            let image = self.image_base(path).and_then(|base| match BinaryImage::load(path, base) {
                Ok(image) => Some(image),
                Err(err) => {
                    debug!(path, "cannot load symbols: {err}");
                    None
                }
            });
            self.images.insert(path.to_string(), image);
        }
        self.images.get(path)?.as_ref()
    }

    fn file_path_for(&self, address: Address) -> Option<String>
    {
        self.region_for(address)
            .filter(|region| region.is_file_backed())
            .and_then(|region| region.path.clone())
    }

    /// The loaded image whose mapping contains `address`.
    pub fn image_for(&mut self, address: Address) -> Option<&BinaryImage>
    {
        let path = self.file_path_for(address)?;
        self.image(&path)
    }

    /// Fill in module, symbol and location of `frame`
    ///
    /// Caller frames hold return addresses, which point just past the call,
    /// so they are looked up at `pc - 1`.
    pub fn symbolicate(&mut self, frame: &mut StackFrame)
    {
        let lookup = if frame.index > 0 { frame.pc - 1 } else { frame.pc };

        let Some(path) = self.file_path_for(lookup) else {
            return;
        };

        if let Some(image) = self.image(&path) {
            let file_address = image.file_address(lookup);
            frame.symbol = image.symbol_for(file_address);
            frame.location = image.location_for(file_address);
        }

        frame.module = Some(path);
    }
}
