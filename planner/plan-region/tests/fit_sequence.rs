//! Long mixed request sequences over a fixed set of regions.

use plan_memory::{MemAttr, Section};
use plan_region::{FitError, MemoryRegion, RegionKind, build_maps, fit_auto, fit_static};

/// Small linear congruential generator; the sequences only need to be varied
/// and repeatable.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

fn regions() -> Vec<MemoryRegion> {
    vec![
        MemoryRegion::new("sram0", RegionKind::Data, 0x2000_0000, 0x2000, MemAttr::RW),
        MemoryRegion::new("sram1", RegionKind::Data, 0x2001_0000, 0x1000, MemAttr::RW)
            .with_align(0x100),
        MemoryRegion::new("flash", RegionKind::Code, 0x0800_0000, 0x4000, MemAttr::RX),
    ]
}

/// Runs a pseudo-random sequence and returns every committed placement.
fn run(seed: u64) -> Vec<(RegionKind, Section)> {
    let mut maps = build_maps(regions()).unwrap();
    let mut rng = Lcg(seed);
    let mut placed = Vec::new();

    for _ in 0..200 {
        let kind = if rng.next() % 3 == 0 {
            RegionKind::Code
        } else {
            RegionKind::Data
        };
        let attr = match kind {
            RegionKind::Code => MemAttr::RX,
            _ => MemAttr::RW,
        };
        let size = (rng.next() % 16 + 1) * 0x20;

        let result = if rng.next() % 4 == 0 {
            let region = maps[(rng.next() % 3) as usize].region().clone();
            let start = region.start + (rng.next() % (region.size / 0x20)) * 0x20;
            fit_static(&mut maps, kind, start, size, attr).map(|()| start)
        } else {
            let align = 0x20 << (rng.next() % 4);
            fit_auto(&mut maps, kind, size, align, attr)
        };

        match result {
            Ok(at) => placed.push((kind, Section::new(at, size))),
            Err(
                FitError::Overlap { .. }
                    | FitError::OutsideDeclared { .. }
                    | FitError::Exhausted { .. },
            ) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    placed
}

#[test]
fn placements_never_overlap_and_stay_inside_regions() {
    let regions = regions();
    for seed in [1, 7, 42, 0xDEAD_BEEF] {
        let placed = run(seed);
        assert!(!placed.is_empty());

        for (i, (kind, a)) in placed.iter().enumerate() {
            assert!(
                regions
                    .iter()
                    .any(|r| r.kind == *kind && r.section().encloses(a.base, a.size)),
                "{a} escaped its region"
            );
            for (_, b) in &placed[i + 1..] {
                assert!(!a.overlaps(b), "{a} overlaps {b}");
            }
        }
    }
}

#[test]
fn sequences_are_deterministic() {
    assert_eq!(run(3), run(3));
}

#[test]
fn auto_placements_honor_alignment() {
    let mut maps = build_maps(regions()).unwrap();
    let mut rng = Lcg(99);
    for _ in 0..40 {
        let align = 0x20 << (rng.next() % 4);
        let size = (rng.next() % 8 + 1) * 0x20;
        if let Ok(at) = fit_auto(&mut maps, RegionKind::Data, size, align, MemAttr::RW) {
            assert_eq!(at % align, 0);
            if (0x2001_0000..0x2001_1000).contains(&at) {
                assert_eq!(at % 0x100, 0);
            }
        }
    }
}
