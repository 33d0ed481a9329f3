//! # Project and Chip Model
//!
//! The typed input of the planner:
//!
//! - [`Chip`]: platform family, declared memory regions, interrupt vectors
//!   and raw platform options.
//! - [`Project`]: the kernel, the user-level runtime and every process with
//!   its segments, threads, invocations, ports, endpoints and vectors.
//!
//! Both can be built directly or converted from the parser's [`AttrNode`]
//! tree. Declarations that receive a capability implement
//! [`KernelObject`](plan_frontier::KernelObject) through the derive macro.
//!
//! ```rust
//! # use plan_model::*;
//! let node = AttrNode::new("chip")
//!     .attr("name", "stm32f405")
//!     .attr("platform", "A7M")
//!     .child(
//!         AttrNode::new("memory")
//!             .attr("name", "sram")
//!             .attr("kind", "data")
//!             .attr("start", 0x2000_0000_u64)
//!             .attr("size", 0x2_0000_u64)
//!             .attr("attr", "RWBC"),
//!     )
//!     .child(AttrNode::new("vector").attr("name", "USART1").attr("number", 37_u64));
//!
//! let chip = Chip::try_from(&node)?;
//! assert_eq!(chip.platform, PlatformKind::A7M);
//! assert_eq!(chip.vector("USART1").map(|v| v.number), Some(37));
//! # Ok::<(), ModelError>(())
//! ```

mod attr;
mod chip;
mod project;

pub use crate::attr::{AttrNode, AttrValue, parse_mem_attr};
pub use crate::chip::{Chip, ChipVector, PlatformKind};
pub use crate::project::{
    InvocationDecl, KernelDecl, MemReq, Place, PortDecl, ProcessDecl, Project, ReceiveDecl,
    RuntimeDecl, Segment, SendDecl, ThreadDecl, VectorDecl,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedTag { expected: &'static str, found: String },
    #[error("<{tag}> needs exactly one <{child}>")]
    ChildCount { tag: String, child: &'static str },
    #[error("<{tag}> is missing `{key}`")]
    MissingAttr { tag: String, key: &'static str },
    #[error("<{tag}> `{key}` must be {expected}")]
    WrongType {
        tag: String,
        key: &'static str,
        expected: &'static str,
    },
    #[error("<{tag}> `{key}` has invalid value `{value}`")]
    InvalidValue {
        tag: String,
        key: &'static str,
        value: String,
    },
    #[error("unknown platform `{0}`")]
    UnknownPlatform(String),
}
