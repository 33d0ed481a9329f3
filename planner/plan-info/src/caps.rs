//! # Capability Slot Constants

/// First free slot of the kernel boot table.
///
/// Slot 0 is the boot table itself, slot 1 the kernel function capability
/// and slot 2 the kernel memory capability; boot objects follow.
pub const KERNEL_CAP_FRONT: u32 = 3;

/// First free slot of the runtime table. The runtime keeps copies of the
/// boot table, the kernel function and kernel memory capabilities, and its
/// own process, thread and page table in the low slots.
pub const RUNTIME_CAP_FRONT: u32 = 8;

/// First free slot of a process local table. Slot 0 is reserved for the
/// process's own table.
pub const PROCESS_CAP_FRONT: u32 = 1;

/// Largest capability index any scope may issue.
pub const MAX_CAP_INDEX: u32 = (1 << 24) - 1;

const _: () = {
    assert!(KERNEL_CAP_FRONT < RUNTIME_CAP_FRONT);
    assert!(PROCESS_CAP_FRONT > 0);
    assert!(MAX_CAP_INDEX > RUNTIME_CAP_FRONT);
};
