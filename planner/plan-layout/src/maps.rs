use plan_frontier::{Allocation, Frontier, KindSpan, ObjectKind};
use plan_memory::{MemAttr, Section};
use plan_model::PlatformKind;
use plan_pgtbl::{NodeId, PageTable};
use plan_region::RegionKind;

/// The finished boot image layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub platform: PlatformKind,
    pub kernel: KernelMap,
    pub runtime: RuntimeMap,
    pub processes: Vec<ProcessMap>,
}

impl Layout {
    #[must_use]
    pub fn process(&self, name: &str) -> Option<&ProcessMap> {
        self.processes.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelMap {
    pub code: Section,
    pub data: Section,
    pub stack: Section,
    /// Interrupt flag sets shared with the runtime.
    pub vector_flags: Section,
    /// Pool every kernel object is carved from.
    pub kmem: Section,
    /// Boot table nodes, in slot order.
    pub captbl: Vec<Allocation>,
    /// Boot table frontier after every boot object was created.
    pub front: Frontier,
    pub spans: Vec<(ObjectKind, KindSpan)>,
    pub vectors: Vec<KernelVector>,
}

/// An interrupt endpoint created by the kernel at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelVector {
    pub name: String,
    pub number: u32,
    /// Process the vector is bound to.
    pub process: String,
    pub endpoint: Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMap {
    pub code: Section,
    pub data: Section,
    pub stack: Section,
    pub pgtbl: PgtblMap,
    /// The runtime's process object, in the boot table.
    pub process: Allocation,
    /// The runtime's init thread, in the boot table.
    pub thread: Allocation,
    /// Runtime table nodes, in slot order.
    pub captbl: Vec<Allocation>,
    pub spans: Vec<(ObjectKind, KindSpan)>,
    pub front: Frontier,
}

/// A page table and the allocation of each of its nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgtblMap {
    pub table: PageTable,
    /// Indexed like [`PageTable::nodes`].
    pub nodes: Vec<Allocation>,
}

impl PgtblMap {
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Allocation> {
        self.nodes.get(id.index())
    }
}

/// Where a process image lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProcessMemory {
    /// First code segment.
    pub code: Section,
    /// First data segment.
    pub data: Section,
    /// Next free offset into `code` for entry points.
    pub code_front: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlacedSegment {
    pub kind: RegionKind,
    pub section: Section,
    pub attr: MemAttr,
}

/// A process's own capability table, created by the runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalTable {
    pub slots: u32,
    pub alloc: Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMap {
    pub name: String,
    pub memory: ProcessMemory,
    /// Every segment, in declaration order.
    pub segments: Vec<PlacedSegment>,
    pub pgtbl: PgtblMap,
    pub captbl: LocalTable,
    pub process: Allocation,
    pub threads: Vec<ThreadMap>,
    pub invocations: Vec<InvocationMap>,
    pub ports: Vec<PortMap>,
    pub receives: Vec<ReceiveMap>,
    pub sends: Vec<SendMap>,
    pub vectors: Vec<VectorMap>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMap {
    pub name: String,
    pub entry: u64,
    pub stack: Section,
    pub priority: u32,
    /// Slot and memory in the runtime table.
    pub cap: Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationMap {
    pub name: String,
    pub entry: u64,
    pub stack: Section,
    /// Slot and memory in the runtime table.
    pub cap: Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMap {
    pub name: String,
    pub local: u32,
    pub process: String,
    pub invocation: String,
    /// Runtime slot of the target invocation.
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMap {
    pub name: String,
    pub local: u32,
    /// The endpoint object, in the runtime table.
    pub runtime: Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMap {
    pub name: String,
    pub local: u32,
    pub process: String,
    pub receive: String,
    /// Runtime slot of the target endpoint.
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMap {
    pub name: String,
    pub number: u32,
    pub local: u32,
    pub runtime: u32,
    /// Slot of the interrupt endpoint in the boot table.
    pub kernel: u32,
}
