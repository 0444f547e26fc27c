//! `/proc/<pid>/maps` parsing.

use std::fs;

use tracing::trace;

use crate::error::Result;
use crate::types::{Address, MemoryRegion, ProcessId};

/// Read and parse the memory map of a live process.
///
/// ## Errors
///
/// Returns `Io` if the maps file can't be read (process gone, no permission).
pub fn read_maps(pid: ProcessId) -> Result<Vec<MemoryRegion>>
{
    let text = fs::read_to_string(format!("/proc/{pid}/maps"))?;
    Ok(parse_maps(&text))
}

/// Parse the text of a maps file
///
/// Each line looks like
/// `55d0c2a00000-55d0c2a21000 r-xp 00001000 08:01 1234567    /usr/bin/foo`.
/// The path may contain spaces and may be missing. Lines that don't parse are
/// skipped.
#[must_use]
pub fn parse_maps(text: &str) -> Vec<MemoryRegion>
{
    text.lines()
        .filter_map(|line| {
            let region = parse_line(line);
            if region.is_none() && !line.trim().is_empty() {
                trace!(line, "skipping unparsable maps line");
            }
            region
        })
        .collect()
}

fn parse_line(line: &str) -> Option<MemoryRegion>
{
    // range, perms, offset, dev, inode
    let mut fields = [""; 5];
    let mut rest = line;
    for slot in &mut fields {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        *slot = &rest[..end];
        rest = &rest[end..];
    }

    let (start, end) = fields[0].split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    let offset = u64::from_str_radix(fields[2], 16).ok()?;

    let path = rest.trim();
    let path = (!path.is_empty()).then(|| path.to_string());

    Some(MemoryRegion::new(
        Address::from(start),
        Address::from(end),
        fields[1].to_string(),
        offset,
        path,
    ))
}
