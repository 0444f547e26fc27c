//! Tests for platform-agnostic types

use crashrun_core::types::{Address, MemoryRegion, ProcessId, Registers, SourceLocation, ThreadId};

#[test]
fn test_process_id_from_u32()
{
    let pid = ProcessId::from(12345);
    assert_eq!(pid.0, 12345);
}

#[test]
fn test_process_id_to_u32()
{
    let pid = ProcessId::from(54321);
    let value: u32 = pid.into();
    assert_eq!(value, 54321);
}

#[test]
fn test_thread_id_from_process_id()
{
    let thread = ThreadId::from(ProcessId::from(77));
    assert_eq!(thread.raw(), 77);
}

#[test]
fn test_registers_new()
{
    let regs = Registers::new();
    assert_eq!(regs.pc, Address::ZERO);
    assert_eq!(regs.sp, Address::ZERO);
    assert_eq!(regs.fp, Address::ZERO);
    assert!(regs.lr.is_none());
}

#[test]
fn test_memory_region_queries()
{
    let region = MemoryRegion::new(
        Address::from(0x5555_0000),
        Address::from(0x5555_2000),
        "r-xp".into(),
        0x1000,
        Some("/usr/bin/true".into()),
    );
    assert_eq!(region.size(), 0x2000);
    assert!(region.is_readable());
    assert!(region.is_executable());
    assert!(region.is_file_backed());
    assert!(region.contains(Address::from(0x5555_1fff)));
    assert!(!region.contains(Address::from(0x5555_2000)));
}

#[test]
fn test_pseudo_paths_are_not_file_backed()
{
    let region = MemoryRegion::new(Address::from(0x1000), Address::from(0x2000), "rw-p".into(), 0, Some("[heap]".into()));
    assert!(!region.is_file_backed());
    assert!(!region.is_executable());
}

#[test]
fn test_address_display_is_zero_padded()
{
    assert_eq!(Address::from(0xdead).to_string(), "0x000000000000dead");
}

#[test]
fn test_source_location_display()
{
    let location = SourceLocation {
        file: "src/main.rs".into(),
        line: Some(12),
    };
    assert_eq!(location.to_string(), "src/main.rs:12");
}
