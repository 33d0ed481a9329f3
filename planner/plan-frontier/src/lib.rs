//! # Frontier Accountant
//!
//! Assigns every kernel object a capability slot and a kernel-memory offset.
//!
//! Three kinds of namespaces ([`Scope`]) exist: the kernel's bootstrap table,
//! the runtime's global table and one local table per process. Each runs a
//! [`Frontier`], a pair of cursors that only ever move forward:
//!
//! ```text
//!   cap:   | captbl | pgtbl ... | process | thread thread thread | ...
//!          ^ start                                              ^ front
//!   kmem:  | captbl   | pgtbl ...   | process | thread ...       |
//! ```
//!
//! Kinds are allocated in [`ObjectKind`] order within a scope, so every kind
//! occupies one contiguous [`KindSpan`]. Auto requests take the frontier;
//! a fixed request may jump ahead of it (leaving a gap) but never behind.
//!
//! ```rust
//! # use plan_frontier::*;
//! let mut acct = Accountant::new(4);
//! acct.open(Scope::Runtime, Frontier::new(8, 0x100))?;
//!
//! let t = Synthetic::new(ObjectKind::Thread, "init");
//! let a = acct.allocate(Scope::Runtime, &t, 0x58)?;
//! assert_eq!((a.cap, a.kmem, a.size), (8, 0x100, 0x60));
//! assert_eq!(acct.front(Scope::Runtime), Some(Frontier::new(9, 0x160)));
//! # Ok::<(), FrontierError>(())
//! ```

mod accountant;
mod object;

pub use crate::accountant::{Accountant, Allocation, Frontier, KindSpan, captbl_nodes_for};
pub use crate::object::{CapRequest, KernelObject, ObjectKind, Promoted, Scope, Synthetic};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontierError {
    #[error("{scope} scope was never opened")]
    UnknownScope { scope: Scope },
    #[error("{scope} scope opened twice")]
    ScopeReopened { scope: Scope },
    #[error("{scope} scope starts at kernel memory {kmem:#x}, which is not {align:#x}-aligned")]
    MisalignedStart { scope: Scope, kmem: u64, align: u64 },
    #[error("{scope}: {kind} `{name}` allocated after {after} objects")]
    OutOfOrder {
        scope: Scope,
        kind: ObjectKind,
        after: ObjectKind,
        name: String,
    },
    #[error("{scope}: `{name}` requests capability {index}, already held by `{holder}`")]
    Collision {
        scope: Scope,
        index: u32,
        name: String,
        holder: String,
    },
    #[error("{scope}: `{name}` requests capability {index}, behind the frontier at {front}")]
    BehindFrontier {
        scope: Scope,
        index: u32,
        front: u32,
        name: String,
    },
    #[error("{scope}: capability index of `{name}` overflows the table")]
    CapOverflow { scope: Scope, name: String },
    #[error("{scope}: kernel memory offset of `{name}` overflows")]
    KmemOverflow { scope: Scope, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ObjectKind, &'static str, u32);

    impl KernelObject for Fixed {
        fn kind(&self) -> ObjectKind {
            self.0
        }

        fn name(&self) -> &str {
            self.1
        }

        fn cap_request(&self) -> CapRequest {
            CapRequest::Fixed(self.2)
        }
    }

    fn thread(name: &str) -> Synthetic {
        Synthetic::new(ObjectKind::Thread, name)
    }

    #[test]
    fn fixed_collision_after_auto() {
        let mut acct = Accountant::new(3);
        acct.open(Scope::Process(0), Frontier::new(5, 0)).unwrap();

        let caps: Vec<_> = ["t0", "t1", "t2"]
            .into_iter()
            .map(|n| acct.allocate(Scope::Process(0), &thread(n), 0).unwrap().cap)
            .collect();
        assert_eq!(caps, [5, 6, 7]);

        let err = acct
            .allocate(Scope::Process(0), &Fixed(ObjectKind::Thread, "t3", 6), 0)
            .unwrap_err();
        assert_eq!(
            err,
            FrontierError::Collision {
                scope: Scope::Process(0),
                index: 6,
                name: "t3".into(),
                holder: "t1".into(),
            }
        );
        assert_eq!(acct.front(Scope::Process(0)).map(|f| f.cap), Some(8));
    }

    #[test]
    fn fixed_requests_skip_ahead_only() {
        let mut acct = Accountant::new(3);
        acct.open(Scope::Kernel, Frontier::new(3, 0)).unwrap();

        assert_eq!(acct.allocate(Scope::Kernel, &thread("a"), 8).unwrap().cap, 3);
        assert_eq!(
            acct.allocate(Scope::Kernel, &Fixed(ObjectKind::Thread, "b", 10), 8).unwrap().cap,
            10
        );
        assert_eq!(acct.allocate(Scope::Kernel, &thread("c"), 8).unwrap().cap, 11);
        assert!(matches!(
            acct.allocate(Scope::Kernel, &Fixed(ObjectKind::Thread, "d", 7), 8),
            Err(FrontierError::BehindFrontier { index: 7, front: 12, .. })
        ));

        let span = acct.span(Scope::Kernel, ObjectKind::Thread).unwrap();
        assert_eq!((span.cap_base, span.cap_front, span.count), (3, 12, 3));
        assert_eq!((span.kmem_base, span.kmem_front), (0, 24));
    }

    #[test]
    fn kmem_is_sum_of_rounded_footprints() {
        let mut acct = Accountant::new(4);
        acct.open(Scope::Runtime, Frontier::new(8, 0x200)).unwrap();

        let sizes: Vec<_> = [20, 1, 0, 64]
            .into_iter()
            .map(|fp| acct.allocate(Scope::Runtime, &thread("t"), fp).unwrap().size)
            .collect();
        assert_eq!(sizes, [32, 16, 0, 64]);
        assert_eq!(acct.front(Scope::Runtime), Some(Frontier::new(12, 0x200 + 112)));
    }

    #[test]
    fn kinds_must_arrive_in_order() {
        let mut acct = Accountant::new(4);
        acct.open(Scope::Runtime, Frontier::new(0, 0)).unwrap();

        acct.allocate(Scope::Runtime, &Synthetic::new(ObjectKind::Captbl, "tbl"), 16).unwrap();
        acct.allocate(Scope::Runtime, &thread("t"), 16).unwrap();
        acct.allocate(Scope::Runtime, &thread("u"), 16).unwrap();
        let err = acct
            .allocate(Scope::Runtime, &Synthetic::new(ObjectKind::Process, "p"), 16)
            .unwrap_err();
        assert!(matches!(
            err,
            FrontierError::OutOfOrder {
                kind: ObjectKind::Process,
                after: ObjectKind::Thread,
                ..
            }
        ));

        let kinds: Vec<_> = acct.spans(Scope::Runtime).map(|(k, _)| k).collect();
        assert_eq!(kinds, [ObjectKind::Captbl, ObjectKind::Thread]);
    }

    #[test]
    fn promoted_objects_get_independent_slots() {
        let mut acct = Accountant::new(4);
        acct.open(Scope::Process(1), Frontier::new(1, 0)).unwrap();
        acct.open(Scope::Runtime, Frontier::new(8, 0)).unwrap();

        let recv = Fixed(ObjectKind::Receive, "rx", 4);
        assert_eq!(acct.allocate(Scope::Process(1), &recv, 0).unwrap().cap, 4);
        assert_eq!(acct.allocate(Scope::Runtime, &Promoted(&recv), 32).unwrap().cap, 8);
        assert_eq!(acct.span(Scope::Process(1), ObjectKind::Receive).map(|s| s.count), Some(1));
        assert_eq!(acct.span(Scope::Runtime, ObjectKind::Receive).map(|s| s.kmem_front), Some(32));
    }

    #[test]
    fn scope_lifecycle() {
        let mut acct = Accountant::new(4);
        assert_eq!(
            acct.allocate(Scope::Kernel, &thread("t"), 0),
            Err(FrontierError::UnknownScope {
                scope: Scope::Kernel
            })
        );
        assert!(matches!(
            acct.open(Scope::Kernel, Frontier::new(3, 0x18)),
            Err(FrontierError::MisalignedStart { align: 16, .. })
        ));
        acct.open(Scope::Kernel, Frontier::new(3, 0x10)).unwrap();
        assert_eq!(
            acct.open(Scope::Kernel, Frontier::new(3, 0x10)),
            Err(FrontierError::ScopeReopened {
                scope: Scope::Kernel
            })
        );
        assert_eq!(acct.issued(Scope::Kernel), 0);
        assert_eq!(acct.front(Scope::Runtime), None);
    }

    #[test]
    fn overflow_is_reported() {
        let mut acct = Accountant::new(4);
        acct.open(Scope::Kernel, Frontier::new(0, 0)).unwrap();
        assert!(matches!(
            acct.allocate(Scope::Kernel, &thread("big"), u64::MAX),
            Err(FrontierError::KmemOverflow { .. })
        ));
        assert!(matches!(
            acct.allocate(Scope::Kernel, &Fixed(ObjectKind::Thread, "far", 1 << 24), 0),
            Err(FrontierError::CapOverflow { .. })
        ));
    }

    #[test]
    fn table_node_count() {
        assert_eq!(captbl_nodes_for(0, 16), Some(0));
        assert_eq!(captbl_nodes_for(15, 16), Some(1));
        assert_eq!(captbl_nodes_for(16, 16), Some(2));
        assert_eq!(captbl_nodes_for(30, 16), Some(2));
        assert_eq!(captbl_nodes_for(31, 16), Some(3));
        assert_eq!(captbl_nodes_for(4, 1), None);
    }
}
