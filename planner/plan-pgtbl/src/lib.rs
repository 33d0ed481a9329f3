//! # Page Table Builder
//!
//! Compresses a process's static mappings into the smallest hierarchical
//! translation tree a target's [`PgtblShape`] allows.
//!
//! ## Algorithm
//!
//! 1. **Validate** the runs: non-empty, aligned to the finest granule, no
//!    overflow, no virtual overlap, inside the top level's address space.
//! 2. **Decompose** each run greedily into chunks: at every step take the
//!    coarsest granule that both the virtual and physical cursor are aligned
//!    to and that still fits the remaining length.
//! 3. **Pick the root**: level 0 at address 0, or for floating shapes the
//!    deepest node that still contains every chunk.
//! 4. **Build** top-down. A node whose chunks are all at least as coarse as
//!    its entries stores them as leaves. Otherwise it becomes a directory and
//!    chunks are handed to per-entry children; coarse chunks are split into
//!    one piece per entry, since a node never mixes leaves and tables.
//!
//! ```text
//!   ARMv7-A, runs: 1 MiB @ 0x0010_0000, 64 KiB @ 0x0030_0000
//!
//!   [section table]  entries 1, 3
//!      ├── [page table @ 0x0010_0000]  1 leaf (1 MiB, spans all entries)
//!      └── [page table @ 0x0030_0000]  16 leaves (4 KiB)
//! ```
//!
//! The result is an arena ([`PageTable`]) in pre-order with the root at
//! index 0; children are referenced by [`NodeId`].
//!
//! ```rust
//! # use plan_pgtbl::*;
//! # use plan_memory::{MemAttr, VirtualAddress};
//! let shape = PgtblShape::new(
//!     vec![Level::new(20, 12), Level::new(12, 8)],
//!     vec![24, 20, 12],
//!     false,
//! )?;
//! let table = build(&shape, &[MapRun::identity(0x0010_0000, 256, MemAttr::RX)])?;
//!
//! assert_eq!(table.len(), 1);
//! assert_eq!(table.leaf_count(), 1);
//! let (pa, _) = table.translate(VirtualAddress::new(0x0010_0040)).unwrap();
//! assert_eq!(pa.as_u64(), 0x0010_0040);
//! # Ok::<(), PgtblError>(())
//! ```

mod shape;
mod table;

use plan_memory::{PhysicalAddress, VirtualAddress};

pub use crate::shape::{Level, PgtblShape};
pub use crate::table::{Entries, Leaf, MapRun, NodeId, PageTable, PgtblNode, build};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PgtblError {
    #[error("invalid page table shape: {0}")]
    InvalidShape(&'static str),
    #[error("no mapping runs")]
    NoRuns,
    #[error("mapping run {run} is empty")]
    EmptyRun { run: usize },
    #[error("mapping run {run} ({virt} -> {phys}) is not aligned to {unit:#x} bytes")]
    Unaligned {
        run: usize,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        unit: u64,
    },
    #[error("mapping run {run} overflows the address space")]
    LengthOverflow { run: usize },
    #[error("mapping runs {first} and {second} overlap")]
    Overlap { first: usize, second: usize },
    #[error("mapping run {run} ends beyond the {span:#x}-byte address space")]
    OutOfRange { run: usize, span: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_memory::MemAttr;

    fn a7a() -> PgtblShape {
        let levels = vec![Level::new(20, 12), Level::new(12, 8)];
        PgtblShape::new(levels, vec![24, 20, 12], false).unwrap()
    }

    fn x64() -> PgtblShape {
        PgtblShape::new(
            vec![Level::new(39, 9), Level::new(30, 9), Level::new(21, 9), Level::new(12, 9)],
            vec![30, 21, 12],
            false,
        )
        .unwrap()
    }

    fn a7m() -> PgtblShape {
        let levels = (0..9).map(|i| Level::new(29 - 3 * i, 3)).collect();
        let granules = (0..9).map(|i| 29 - 3 * i).collect();
        PgtblShape::new(levels, granules, true).unwrap()
    }

    #[test]
    fn two_supersections() {
        let shape = PgtblShape::new(vec![Level::new(20, 12)], vec![28, 20], false).unwrap();
        let table = build(&shape, &[MapRun::identity(0, 512, MemAttr::RX)]).unwrap();

        assert_eq!(table.len(), 1);
        let orders: Vec<_> = table.leaves().map(|l| l.order).collect();
        assert_eq!(orders, [28, 28]);
    }

    #[test]
    fn pages_fold_into_sections() {
        let table = build(&a7a(), &[MapRun::identity(0, 512, MemAttr::RW)]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.directory_count(), 0);
        assert_eq!(table.leaf_count(), 2);
        assert!(table.leaves().all(|l| l.order == 20));
    }

    #[test]
    fn mixed_sections_and_pages() {
        let table = build(
            &a7a(),
            &[
                MapRun::identity(0x0010_0000, 256, MemAttr::RW),
                MapRun::identity(0x0030_0000, 16, MemAttr::RX),
            ],
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.directory_count(), 1);
        assert_eq!(table.leaf_count(), 17);

        let Entries::Children(children) = &table.root().entries else {
            panic!("root should be a directory");
        };
        assert_eq!(children.keys().copied().collect::<Vec<_>>(), [1, 3]);

        let section = table.node(children[&1]);
        assert_eq!(section.parent, Some((NodeId::ROOT, 1)));
        assert_eq!(section.base.as_u64(), 0x0010_0000);
        let Entries::Leaves(leaves) = &section.entries else {
            panic!("expected leaves");
        };
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].order, 20);
        assert!(!section.is_top && table.root().is_top);
    }

    #[test]
    fn supersection_spans_entries() {
        let table = build(&a7a(), &[MapRun::identity(0x0100_0000, 4096, MemAttr::RW)]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.leaves().next().map(|l| l.order), Some(24));

        let (pa, attr) = table.translate(VirtualAddress::new(0x0180_0010)).unwrap();
        assert_eq!(pa.as_u64(), 0x0180_0010);
        assert_eq!(attr, MemAttr::RW);
        assert_eq!(table.translate(VirtualAddress::new(0x0200_0000)), None);
    }

    #[test]
    fn x64_chain_is_built_on_demand() {
        let table = build(&x64(), &[MapRun::identity(0x20_0000, 513, MemAttr::RW)]).unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(table.directory_count(), 3);
        assert_eq!(table.leaf_count(), 2);
        assert_eq!(table.mapped_bytes(), 513 * 4096);

        let levels: Vec<_> = table.nodes().iter().map(|n| n.level).collect();
        assert_eq!(levels, [0, 1, 2, 3, 3]);
    }

    #[test]
    fn floating_root_descends() {
        let table = build(&a7m(), &[MapRun::identity(0x2000_0000, 32, MemAttr::RW)]).unwrap();
        let root = table.root();
        assert_eq!(table.len(), 1);
        assert_eq!(root.level, 7);
        assert_eq!(root.base.as_u64(), 0x2000_0000);
        assert_eq!(root.size_order, 8);
        assert_eq!(table.leaf_count(), 4);

        let table = build(
            &a7m(),
            &[
                MapRun::identity(0x2000_0000, 32, MemAttr::RW),
                MapRun::identity(0x2000_1000, 32, MemAttr::RW),
            ],
        )
        .unwrap();
        assert_eq!(table.root().level, 6);
        assert_eq!(table.len(), 3);
        assert_eq!(table.leaf_count(), 8);
    }

    #[test]
    fn invalid_runs() {
        let rw = MemAttr::RW;
        assert_eq!(build(&a7a(), &[]), Err(PgtblError::NoRuns));
        assert_eq!(
            build(&a7a(), &[MapRun::identity(0x1000, 0, rw)]),
            Err(PgtblError::EmptyRun { run: 0 })
        );
        assert!(matches!(
            build(&a7a(), &[MapRun::identity(0x1000, 1, rw), MapRun::identity(0x2010, 1, rw)]),
            Err(PgtblError::Unaligned { run: 1, .. })
        ));
        assert_eq!(
            build(&a7a(), &[MapRun::identity(0x1000, u64::MAX, rw)]),
            Err(PgtblError::LengthOverflow { run: 0 })
        );
        assert_eq!(
            build(&a7a(), &[MapRun::identity(0x2000, 1, rw), MapRun::identity(0x1000, 2, rw)]),
            Err(PgtblError::Overlap { first: 0, second: 1 })
        );
        assert_eq!(
            build(&a7a(), &[MapRun::identity(0xFFFF_F000, 2, rw)]),
            Err(PgtblError::OutOfRange {
                run: 0,
                span: 1 << 32
            })
        );
    }
}
