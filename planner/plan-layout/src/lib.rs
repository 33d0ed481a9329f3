//! # Boot Image Layout
//!
//! Turns a [`Chip`] and a [`Project`] into a [`Layout`]: every section placed,
//! every page table built, every kernel object given a capability slot and a
//! kernel-memory offset.
//!
//! [`plan`] picks the target's [`Geometry`](plan_platform::Geometry) once and
//! runs the passes in a fixed order:
//!
//! 1. platform options, target checks and wiring checks
//! 2. rounding of memory requests to the mapping granule
//! 3. region fitting: fixed requests first, then auto requests, each in
//!    declaration order
//! 4. per-process stacks and entry points
//! 5. identity-mapped page tables for the runtime and every process
//! 6. capability and kernel-memory accounting: process scopes, then the
//!    kernel's boot table, then the runtime table
//!
//! Any failure aborts the whole run; nothing is partially planned.
//!
//! ```rust
//! # use plan_layout::*;
//! # use plan_memory::MemAttr;
//! # use plan_model::*;
//! # use plan_region::{MemoryRegion, RegionKind};
//! let chip = Chip::new("m4", PlatformKind::A7M)
//!     .with_region(MemoryRegion::new("flash", RegionKind::Code, 0x0800_0000, 0x10_0000, MemAttr::RX))
//!     .with_region(MemoryRegion::new("sram", RegionKind::Data, 0x2000_0000, 0x2_0000, MemAttr::RW));
//!
//! let mut app = ProcessDecl::new("app");
//! app.segments.push(Segment::code(MemReq::auto(0x1000, MemAttr::RX)));
//! app.segments.push(Segment::data(MemReq::auto(0x800, MemAttr::RW)));
//! app.threads.push(ThreadDecl {
//!     name: "main".into(),
//!     stack_size: 0x200,
//!     ..ThreadDecl::default()
//! });
//!
//! let project = Project {
//!     name: "demo".into(),
//!     kernel: KernelDecl {
//!         code: MemReq::fixed(0x0800_0000, 0x8000, MemAttr::RX),
//!         data: MemReq::auto(0x1000, MemAttr::RW),
//!         kmem: MemReq::auto(0x4000, MemAttr::RW),
//!         ..KernelDecl::default()
//!     },
//!     runtime: RuntimeDecl {
//!         code: MemReq::auto(0x4000, MemAttr::RX),
//!         data: MemReq::auto(0x1000, MemAttr::RW),
//!         ..RuntimeDecl::default()
//!     },
//!     processes: vec![app],
//! };
//!
//! let layout = plan(&chip, &project)?;
//! let app = layout.process("app").unwrap();
//! assert_eq!(layout.kernel.code.base, 0x0800_0000);
//! assert_eq!(app.threads[0].entry, app.memory.code.base + 8);
//! # Ok::<(), LayoutError>(())
//! ```

mod maps;
mod planner;
mod wiring;

use log::info;
use plan_frontier::{FrontierError, Scope};
use plan_model::{Chip, PlatformKind, Project};
use plan_pgtbl::PgtblError;
use plan_platform::PlatformError;
use plan_region::{FitError, RegionKind};

pub use crate::maps::{
    InvocationMap, KernelMap, KernelVector, Layout, LocalTable, PgtblMap, PlacedSegment,
    PortMap, ProcessMap, ProcessMemory, ReceiveMap, RuntimeMap, SendMap, ThreadMap, VectorMap,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("support for {0} targets is not compiled in")]
    PlatformDisabled(PlatformKind),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("{owner}: {what} cannot be aligned")]
    Align {
        owner: String,
        what: String,
        #[source]
        source: PlatformError,
    },
    #[error("{owner}: cannot place {what}")]
    Fit {
        owner: String,
        what: String,
        #[source]
        source: FitError,
    },
    #[error("{owner}: cannot build the page table")]
    Pgtbl {
        owner: String,
        #[source]
        source: PgtblError,
    },
    #[error(transparent)]
    Frontier(#[from] FrontierError),
    #[error("{owner}: unknown {what} `{name}`")]
    UnknownReference {
        owner: String,
        what: &'static str,
        name: String,
    },
    #[error("{owner}: `{name}` is declared twice")]
    Duplicate { owner: String, name: String },
    #[error("vector `{vector}` is bound by `{first}` and `{second}`")]
    VectorRebound {
        vector: String,
        first: String,
        second: String,
    },
    #[error("process `{process}` has no {kind} segment")]
    MissingSegment { process: String, kind: RegionKind },
    #[error("process `{process}`: entry of `{name}` at {addr:#x} lies outside its code")]
    EntryOutsideCode {
        process: String,
        name: String,
        addr: u64,
    },
    #[error("process `{process}` needs {slots} local slots, a table holds {capacity}")]
    LocalTableFull {
        process: String,
        slots: u32,
        capacity: u32,
    },
    #[error("{scope} table has {slots} slots but capability {front} was issued")]
    CaptblOverflow { scope: Scope, front: u32, slots: u64 },
    #[error("kernel objects need {needed:#x} bytes, the kernel memory pool has {available:#x}")]
    KmemExhausted { needed: u64, available: u64 },
}

/// Plans the boot image of `project` on `chip`.
///
/// The same input always yields the same layout.
///
/// # Errors
/// The first problem found, see [`LayoutError`].
pub fn plan(chip: &Chip, project: &Project) -> Result<Layout, LayoutError> {
    info!(
        "planning `{}` on `{}` ({}): {} processes",
        project.name,
        chip.name,
        chip.platform,
        project.processes.len()
    );

    match chip.platform {
        #[cfg(feature = "a7m")]
        PlatformKind::A7M => planner::Planner::<plan_platform::A7m>::new(chip, project)?.run(),
        #[cfg(feature = "a7a")]
        PlatformKind::A7A => planner::Planner::<plan_platform::A7a>::new(chip, project)?.run(),
        #[cfg(feature = "x64")]
        PlatformKind::X64 => planner::Planner::<plan_platform::X64>::new(chip, project)?.run(),
        #[allow(unreachable_patterns)]
        other => Err(LayoutError::PlatformDisabled(other)),
    }
}
