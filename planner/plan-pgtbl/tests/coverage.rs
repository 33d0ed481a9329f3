//! Built trees translate exactly the pages their runs declare.

use plan_memory::{MemAttr, PhysicalAddress, VirtualAddress};
use plan_pgtbl::{Entries, Level, MapRun, PageTable, PgtblShape, build};

fn a7a() -> PgtblShape {
    PgtblShape::new(vec![Level::new(20, 12), Level::new(12, 8)], vec![24, 20, 12], false).unwrap()
}

fn x64() -> PgtblShape {
    PgtblShape::new(
        vec![Level::new(39, 9), Level::new(30, 9), Level::new(21, 9), Level::new(12, 9)],
        vec![30, 21, 12],
        false,
    )
    .unwrap()
}

fn assert_covers(table: &PageTable, runs: &[MapRun], unit: u64) {
    let expected: u64 = runs.iter().map(|r| r.count * unit).sum();
    assert_eq!(table.mapped_bytes(), expected);

    for run in runs {
        for page in 0..run.count {
            let va = run.virt + page * unit;
            let (pa, attr) = table.translate(va).expect("page must be mapped");
            assert_eq!(pa, run.phys + page * unit, "{va:?}");
            assert_eq!(attr, run.attr);
        }
        // Just below and just past the run.
        if let Some(before) = run.virt.as_u64().checked_sub(unit) {
            let mapped_elsewhere = runs
                .iter()
                .any(|r| before >= r.virt.as_u64() && before < r.virt.as_u64() + r.count * unit);
            assert_eq!(table.translate(VirtualAddress::new(before)).is_some(), mapped_elsewhere);
        }
    }
}

fn assert_well_formed(table: &PageTable) {
    for (id, node) in table.preorder() {
        match &node.entries {
            Entries::Leaves(leaves) => {
                assert!(!leaves.is_empty());
                for leaf in leaves {
                    assert!(leaf.order >= node.size_order);
                    assert!(leaf.virt.is_aligned(leaf.order));
                    assert!(node.covers(leaf.virt));
                }
                for pair in leaves.windows(2) {
                    assert!(pair[0].virt + pair[0].size() <= pair[1].virt);
                }
            }
            Entries::Children(children) => {
                assert!(!children.is_empty());
                for (&entry, &child) in children {
                    assert!(child > id);
                    let child = table.node(child);
                    assert_eq!(child.parent, Some((id, entry)));
                    assert_eq!(child.base, node.base + (entry << node.size_order));
                    assert_eq!(child.span_order(), node.size_order);
                }
            }
        }
    }
}

#[test]
fn a7a_mixed_runs() {
    let runs = [
        MapRun::identity(0x0000_0000, 300, MemAttr::RX),
        MapRun::identity(0x0100_0000, 4096 + 3, MemAttr::RW),
        MapRun::new(
            PhysicalAddress::new(0x8010_0000),
            VirtualAddress::new(0x0050_0000),
            256,
            MemAttr::RW.with_bufferable(true),
        ),
    ];
    let table = build(&a7a(), &runs).unwrap();
    assert_covers(&table, &runs, 4096);
    assert_well_formed(&table);
}

#[test]
fn x64_unaligned_physical_side_falls_back_to_pages() {
    // The virtual side is 2 MiB aligned but the physical side is not.
    let runs = [MapRun::new(
        PhysicalAddress::new(0x0010_1000),
        VirtualAddress::new(0x4000_0000),
        1024,
        MemAttr::RW,
    )];
    let table = build(&x64(), &runs).unwrap();
    assert_covers(&table, &runs, 4096);
    assert_well_formed(&table);
    assert!(table.leaves().all(|l| l.order == 12));
    assert_eq!(table.leaf_count(), 1024);
}

#[test]
fn x64_runs_in_any_order() {
    let runs = [
        MapRun::identity(0x0060_0000, 1, MemAttr::RW),
        MapRun::identity(0x4000_0000, 512 * 512 + 512, MemAttr::RX),
        MapRun::identity(0x0020_0000, 512, MemAttr::R),
    ];
    let table = build(&x64(), &runs).unwrap();
    assert_covers(&table, &runs, 4096);
    assert_well_formed(&table);
}

#[test]
fn identical_input_builds_identical_trees() {
    let runs = [
        MapRun::identity(0x0010_0000, 256, MemAttr::RW),
        MapRun::identity(0x0030_0000, 16, MemAttr::RX),
    ];
    assert_eq!(build(&a7a(), &runs), build(&a7a(), &runs));
}
