//! Symbol demangling.
//!
//! Rust symbols (legacy `_ZN...17h<hash>E` and v0 `_R...`) are demangled
//! with `rustc-demangle`, printed without the trailing hash. Itanium C++
//! names are recognised but left mangled. Everything else is taken as C.

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Create a [`SymbolName`] from a raw linkage name.
pub(crate) fn make_symbol_name(raw: &str) -> SymbolName
{
    match try_demangle(raw) {
        Ok(demangled) => SymbolName::new(raw.to_string(), Some(format!("{demangled:#}")), SymbolLanguage::Rust),
        Err(_) if raw.starts_with("_Z") => SymbolName::new(raw.to_string(), None, SymbolLanguage::Cpp),
        Err(_) => SymbolName::new(raw.to_string(), None, SymbolLanguage::C),
    }
}
