//! # Memory Layout Constants

/// log2 of the region bitmap unit.
pub const REGION_UNIT_ORDER: u32 = 5;

/// Size of one region bitmap unit in bytes. Every declared memory region
/// starts and ends on a multiple of this.
pub const REGION_UNIT: u64 = 1 << REGION_UNIT_ORDER;

/// Words at the start of a process code image holding the image header
/// (magic and entry count). Auto-placed entry points start right after it.
pub const PROCESS_HEADER_WORDS: u64 = 2;

/// Words reserved per auto-placed entry point in a process code image.
pub const ENTRY_SLOT_WORDS: u64 = 1;

/// Number of interrupt flag sets the kernel keeps. The runtime drains one
/// set while the kernel fills the other.
pub const VECTOR_FLAG_SETS: u64 = 2;

/// Alignment of the interrupt flag section.
pub const VECTOR_FLAG_ALIGN: u64 = 64;

/// Default kernel stack size when the project does not declare one.
pub const DEFAULT_KERNEL_STACK: u64 = 1024;

/// Default runtime stack size when the project does not declare one.
pub const DEFAULT_RUNTIME_STACK: u64 = 2048;

const _: () = {
    assert!(REGION_UNIT.is_power_of_two());
    assert!(VECTOR_FLAG_ALIGN.is_power_of_two());
    assert!(VECTOR_FLAG_ALIGN >= REGION_UNIT);
    assert!(DEFAULT_KERNEL_STACK.is_multiple_of(REGION_UNIT));
    assert!(DEFAULT_RUNTIME_STACK.is_multiple_of(REGION_UNIT));
    assert!(PROCESS_HEADER_WORDS > 0);
};
