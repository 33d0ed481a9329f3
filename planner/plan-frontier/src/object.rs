use core::fmt;

/// Kernel object kinds, in creation order.
///
/// Within one scope objects must be allocated in this order; the derived
/// [`Ord`] is that order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Captbl,
    Pgtbl,
    Process,
    Thread,
    Invocation,
    Port,
    Receive,
    Send,
    Vector,
}

impl ObjectKind {
    pub const ALL: [Self; 9] = [
        Self::Captbl,
        Self::Pgtbl,
        Self::Process,
        Self::Thread,
        Self::Invocation,
        Self::Port,
        Self::Receive,
        Self::Send,
        Self::Vector,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Captbl => "captbl",
            Self::Pgtbl => "pgtbl",
            Self::Process => "process",
            Self::Thread => "thread",
            Self::Invocation => "invocation",
            Self::Port => "port",
            Self::Receive => "receive",
            Self::Send => "send",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability namespace.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// The kernel's bootstrap table.
    Kernel,
    /// The one global table of the user-level runtime.
    Runtime,
    /// A process's local table, by declaration index.
    Process(usize),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel => f.write_str("kernel"),
            Self::Runtime => f.write_str("runtime"),
            Self::Process(i) => write!(f, "process #{i}"),
        }
    }
}

/// How an object wants its capability slot chosen.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CapRequest {
    /// Next free slot of its kind.
    #[default]
    Auto,
    /// A specific slot; must not be behind the frontier.
    Fixed(u32),
}

/// Anything that receives a capability slot.
///
/// Declaration structs implement this with `#[derive(KernelObject)]`.
pub trait KernelObject {
    fn kind(&self) -> ObjectKind;

    /// Name used in diagnostics.
    fn name(&self) -> &str;

    fn cap_request(&self) -> CapRequest {
        CapRequest::Auto
    }
}

impl<T: KernelObject + ?Sized> KernelObject for &T {
    fn kind(&self) -> ObjectKind {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn cap_request(&self) -> CapRequest {
        (**self).cap_request()
    }
}

/// An object the planner creates on its own: table nodes, the runtime's
/// process and thread, and the like. Always auto-placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthetic {
    pub kind: ObjectKind,
    pub name: String,
}

impl Synthetic {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl KernelObject for Synthetic {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A process-local object presented to the runtime scope.
///
/// The runtime slot is always auto-placed; a fixed local index says nothing
/// about where the runtime keeps its copy.
#[derive(Copy, Clone)]
pub struct Promoted<'a>(pub &'a dyn KernelObject);

impl KernelObject for Promoted<'_> {
    fn kind(&self) -> ObjectKind {
        self.0.kind()
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

impl fmt::Debug for Promoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Promoted").field(&self.0.kind()).field(&self.0.name()).finish()
    }
}
