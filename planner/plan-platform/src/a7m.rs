//! # ARMv7-M
//!
//! No MMU: an address space is a set of MPU regions. Each region is a power
//! of two in size and split into eight subregions that can be enabled one by
//! one, which makes the region set a tree with eight entries per node:
//!
//! ```text
//!   level  size_order  node covers
//!     0        29        4 GiB
//!     1        26      512 MiB
//!    ...
//!     8         5      256 B     (32 B subregions)
//! ```
//!
//! The root floats: an address space starts at the smallest node holding all
//! of its mappings. Every node that carries leaves costs one MPU region.

use std::collections::BTreeMap;

use plan_model::{Chip, MemReq, Place, PlatformKind, Project};
use plan_pgtbl::{Level, PageTable, PgtblShape};

use crate::options::Options;
use crate::{Geometry, PlatformError, check_addresses, check_vectors};

const PLATFORM: &str = "A7M";
const WORD: u64 = 4;
const ADDRESS_LIMIT: u64 = 1 << 32;
const NVIC_LINES: u32 = 240;

const CAPTBL_CAPACITY: u32 = 64;
const KMEM_ORDER: u32 = 4;
const SLOT_WORDS: u64 = 4;
const NODE_HEADER_WORDS: u64 = 4;
/// Cached RBAR/RASR pair per MPU region, kept in the top node.
const REGION_CACHE_WORDS: u64 = 2;
const THREAD_WORDS: u64 = 16 + 17;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum A7mFpu {
    #[default]
    None,
    Fpv4Sp,
    Fpv5Sp,
    Fpv5Dp,
}

impl A7mFpu {
    /// Extra context words a thread keeps for the FPU.
    const fn context_words(self) -> u64 {
        match self {
            Self::None => 0,
            Self::Fpv4Sp | Self::Fpv5Sp => 16 + 1,
            Self::Fpv5Dp => 32 + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A7m {
    fpu: A7mFpu,
    mpu_regions: u32,
    nvic_grouping: u32,
    shape: PgtblShape,
}

impl A7m {
    #[must_use]
    pub const fn fpu(&self) -> A7mFpu {
        self.fpu
    }

    #[must_use]
    pub const fn mpu_regions(&self) -> u32 {
        self.mpu_regions
    }

    #[must_use]
    pub const fn nvic_grouping(&self) -> u32 {
        self.nvic_grouping
    }
}

impl Geometry for A7m {
    const KIND: PlatformKind = PlatformKind::A7M;

    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn word_bits(&self) -> u32 {
        32
    }

    fn captbl_capacity(&self) -> u32 {
        CAPTBL_CAPACITY
    }

    fn kmem_order(&self) -> u32 {
        KMEM_ORDER
    }

    fn shape(&self) -> &PgtblShape {
        &self.shape
    }

    fn pgtbl_size(&self, num_order: u32, is_top: bool) -> u64 {
        let cache = if is_top {
            u64::from(self.mpu_regions) * REGION_CACHE_WORDS
        } else {
            0
        };
        (NODE_HEADER_WORDS + (1 << num_order) + cache) * WORD
    }

    fn captbl_size(&self, slots: u32) -> u64 {
        u64::from(slots) * SLOT_WORDS * WORD
    }

    fn process_size(&self) -> u64 {
        4 * WORD
    }

    fn thread_size(&self) -> u64 {
        (THREAD_WORDS + self.fpu.context_words()) * WORD
    }

    fn invocation_size(&self) -> u64 {
        8 * WORD
    }

    fn endpoint_size(&self) -> u64 {
        4 * WORD
    }

    fn stack_align(&self) -> u64 {
        8
    }

    fn parse_options(options: &BTreeMap<String, String>) -> Result<Self, PlatformError> {
        let opts = Options::new(PLATFORM, options, &["FPU", "MPU_Regions", "NVIC_Grouping"])?;
        let fpu = opts.choice(
            "FPU",
            &[
                ("None", A7mFpu::None),
                ("FPV4_SP", A7mFpu::Fpv4Sp),
                ("FPV5_SP", A7mFpu::Fpv5Sp),
                ("FPV5_DP", A7mFpu::Fpv5Dp),
            ],
            A7mFpu::None,
            "None, FPV4_SP, FPV5_SP or FPV5_DP",
        )?;
        let mpu_regions = opts.int("MPU_Regions", 8..=16, 8, "8 or 16")?;
        if mpu_regions != 8 && mpu_regions != 16 {
            return Err(PlatformError::InvalidOption {
                platform: PLATFORM,
                key: "MPU_Regions".into(),
                value: mpu_regions.to_string(),
                expected: "8 or 16",
            });
        }
        let nvic_grouping = opts.int("NVIC_Grouping", 0..=7, 0, "0 to 7")?;

        let levels = (0..9).map(|i| Level::new(29 - 3 * i, 3)).collect();
        let granules = (0..9).map(|i| 29 - 3 * i).collect();
        let shape = PgtblShape::new(levels, granules, true)?;

        Ok(Self {
            fpu,
            mpu_regions,
            nvic_grouping,
            shape,
        })
    }

    fn check_input(&self, chip: &Chip, project: &Project) -> Result<(), PlatformError> {
        check_addresses(chip, project, ADDRESS_LIMIT)?;
        check_vectors(chip, 0, NVIC_LINES)
    }

    /// An auto request becomes one MPU region: its size is rounded up to a
    /// power of two and it is aligned to that size. Fixed requests only need
    /// the subregion granule.
    fn align_mem(&self, req: &MemReq) -> Result<MemReq, PlatformError> {
        let granule = 1u64 << self.shape.unit_order();
        if req.align != 0 && !req.align.is_power_of_two() {
            return Err(PlatformError::BadAlignment { align: req.align });
        }
        let overflow = PlatformError::SizeOverflow { size: req.size };

        let (size, align) = match req.place {
            Place::Fixed(base) => {
                if !base.is_multiple_of(granule) {
                    return Err(PlatformError::Misaligned { base, granule });
                }
                let size = req.size.checked_next_multiple_of(granule).ok_or(overflow)?;
                (size, req.align.max(granule))
            }
            Place::Auto => {
                let size = req.size.max(granule).checked_next_power_of_two().ok_or(overflow)?;
                (size, req.align.max(size))
            }
        };

        Ok(MemReq {
            place: req.place,
            size,
            align,
            attr: req.attr,
        })
    }

    fn check_pgtbl(&self, owner: &str, table: &PageTable) -> Result<(), PlatformError> {
        let used = table.nodes().iter().filter(|n| !n.is_directory()).count();
        if used > self.mpu_regions as usize {
            return Err(PlatformError::TooManyRegions {
                what: owner.to_owned(),
                used,
                limit: self.mpu_regions,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_memory::MemAttr;
    use plan_model::{ChipVector, MemReq};
    use plan_pgtbl::MapRun;

    fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    #[test]
    fn defaults() {
        let g = A7m::parse_options(&BTreeMap::new()).unwrap();
        assert_eq!(g.fpu(), A7mFpu::None);
        assert_eq!(g.mpu_regions(), 8);
        assert_eq!(g.word_bytes(), 4);
        assert_eq!(g.shape().unit_order(), 5);
        assert!(g.shape().is_floating());
    }

    #[test]
    fn fpu_grows_threads() {
        let plain = A7m::parse_options(&BTreeMap::new()).unwrap();
        let dp = A7m::parse_options(&opts(&[("FPU", "FPV5_DP")])).unwrap();
        assert_eq!(plain.thread_size(), 33 * 4);
        assert_eq!(dp.thread_size(), (33 + 33) * 4);
    }

    #[test]
    fn top_node_carries_region_cache() {
        let g = A7m::parse_options(&opts(&[("MPU_Regions", "16")])).unwrap();
        assert_eq!(g.pgtbl_size(3, false), (4 + 8) * 4);
        assert_eq!(g.pgtbl_size(3, true), (4 + 8 + 32) * 4);
    }

    #[test]
    fn invalid_options() {
        for bad in [
            &[("MPU_Regions", "12")][..],
            &[("NVIC_Grouping", "8")],
            &[("FPU", "VFPV3")],
            &[("Cache", "on")],
        ] {
            assert!(A7m::parse_options(&opts(bad)).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn align_mem_makes_auto_requests_one_region() {
        let g = A7m::parse_options(&BTreeMap::new()).unwrap();
        let req = g.align_mem(&MemReq::auto(0x41, MemAttr::RW)).unwrap();
        assert_eq!((req.size, req.align), (0x80, 0x80));
        let req = g.align_mem(&MemReq::auto(0x8, MemAttr::RW).with_align(0x400)).unwrap();
        assert_eq!((req.size, req.align), (0x20, 0x400));

        let req = g.align_mem(&MemReq::fixed(0x2000_0040, 0x41, MemAttr::RW)).unwrap();
        assert_eq!((req.size, req.align), (0x60, 0x20));
        assert_eq!(
            g.align_mem(&MemReq::fixed(0x2000_0010, 0x20, MemAttr::RW)),
            Err(PlatformError::Misaligned {
                base: 0x2000_0010,
                granule: 0x20
            })
        );
    }

    #[test]
    fn vector_numbers_are_bounded() {
        let g = A7m::parse_options(&BTreeMap::new()).unwrap();
        let chip = Chip::new("m4", PlatformKind::A7M).with_vector(ChipVector::new("late", 240));
        assert!(matches!(
            g.check_input(&chip, &Project::default()),
            Err(PlatformError::VectorOutOfRange { number: 240, .. })
        ));
    }

    #[test]
    fn region_budget() {
        let g = A7m::parse_options(&BTreeMap::new()).unwrap();
        // Nine scattered 32-byte islands need nine leaf nodes.
        let runs: Vec<_> = (0..9)
            .map(|i| MapRun::identity(0x2000_0000 + i * 0x1_0000, 1, MemAttr::RW))
            .collect();
        let table = g.alloc_pgtbl(&runs).unwrap();
        assert!(matches!(
            g.check_pgtbl("p", &table),
            Err(PlatformError::TooManyRegions { used: 9, limit: 8, .. })
        ));
    }
}
