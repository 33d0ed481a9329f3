use plan_frontier::CapRequest;
use plan_memory::MemAttr;
use plan_region::RegionKind;
use utils_object_derive::KernelObject;

/// Where something goes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Place {
    /// The planner chooses.
    #[default]
    Auto,
    /// At this address.
    Fixed(u64),
}

impl Place {
    #[inline]
    #[must_use]
    pub const fn fixed(self) -> Option<u64> {
        match self {
            Self::Auto => None,
            Self::Fixed(addr) => Some(addr),
        }
    }
}

/// A memory requirement: a size, where to put it and what it needs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MemReq {
    pub place: Place,
    pub size: u64,
    /// Required alignment of an auto-placed request; 0 means none.
    pub align: u64,
    pub attr: MemAttr,
}

impl MemReq {
    #[must_use]
    pub const fn auto(size: u64, attr: MemAttr) -> Self {
        Self {
            place: Place::Auto,
            size,
            align: 0,
            attr,
        }
    }

    #[must_use]
    pub const fn fixed(base: u64, size: u64, attr: MemAttr) -> Self {
        Self {
            place: Place::Fixed(base),
            size,
            align: 0,
            attr,
        }
    }

    #[must_use]
    pub const fn with_align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }
}

/// One memory segment of a process image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub kind: RegionKind,
    pub req: MemReq,
}

impl Segment {
    #[must_use]
    pub const fn code(req: MemReq) -> Self {
        Self {
            kind: RegionKind::Code,
            req,
        }
    }

    #[must_use]
    pub const fn data(req: MemReq) -> Self {
        Self {
            kind: RegionKind::Data,
            req,
        }
    }

    #[must_use]
    pub const fn device(req: MemReq) -> Self {
        Self {
            kind: RegionKind::Device,
            req,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelDecl {
    pub code: MemReq,
    pub data: MemReq,
    /// Zero selects the default kernel stack.
    pub stack_size: u64,
    /// Kernel object memory pool.
    pub kmem: MemReq,
    /// Spare slots appended to the boot table.
    pub extra_captbl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeDecl {
    pub code: MemReq,
    pub data: MemReq,
    /// Zero selects the default runtime stack.
    pub stack_size: u64,
    /// Spare slots appended to the runtime table.
    pub extra_captbl: u32,
}

/// A thread; its capability lives in the runtime table.
#[derive(Debug, Clone, Default, PartialEq, Eq, KernelObject)]
#[object(kind = Thread)]
pub struct ThreadDecl {
    pub name: String,
    pub entry: Place,
    pub stack_size: u64,
    pub priority: u32,
    pub cap: CapRequest,
}

/// A synchronous invocation target; its capability lives in the runtime
/// table.
#[derive(Debug, Clone, Default, PartialEq, Eq, KernelObject)]
#[object(kind = Invocation)]
pub struct InvocationDecl {
    pub name: String,
    pub entry: Place,
    pub stack_size: u64,
    pub cap: CapRequest,
}

/// A process-local handle onto another process's invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, KernelObject)]
#[object(kind = Port)]
pub struct PortDecl {
    pub name: String,
    pub process: String,
    pub invocation: String,
    pub cap: CapRequest,
}

/// A receive endpoint owned by its process.
#[derive(Debug, Clone, Default, PartialEq, Eq, KernelObject)]
#[object(kind = Receive)]
pub struct ReceiveDecl {
    pub name: String,
    pub cap: CapRequest,
}

/// A send handle onto another process's receive endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, KernelObject)]
#[object(kind = Send)]
pub struct SendDecl {
    pub name: String,
    pub process: String,
    pub receive: String,
    pub cap: CapRequest,
}

/// A chip interrupt bound to the process; `name` names the chip vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, KernelObject)]
#[object(kind = Vector)]
pub struct VectorDecl {
    pub name: String,
    pub cap: CapRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessDecl {
    pub name: String,
    pub segments: Vec<Segment>,
    /// Bytes at the start of the first data segment kept free of stacks.
    pub data_reserve: u64,
    /// Spare slots appended to the local table.
    pub extra_captbl: u32,
    pub threads: Vec<ThreadDecl>,
    pub invocations: Vec<InvocationDecl>,
    pub ports: Vec<PortDecl>,
    pub receives: Vec<ReceiveDecl>,
    pub sends: Vec<SendDecl>,
    pub vectors: Vec<VectorDecl>,
}

impl ProcessDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn invocation(&self, name: &str) -> Option<&InvocationDecl> {
        self.invocations.iter().find(|i| i.name == name)
    }

    #[must_use]
    pub fn receive(&self, name: &str) -> Option<&ReceiveDecl> {
        self.receives.iter().find(|r| r.name == name)
    }
}

/// The whole software project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub kernel: KernelDecl,
    pub runtime: RuntimeDecl,
    pub processes: Vec<ProcessDecl>,
}

impl Project {
    #[must_use]
    pub fn process(&self, name: &str) -> Option<(usize, &ProcessDecl)> {
        self.processes.iter().enumerate().find(|(_, p)| p.name == name)
    }
}
