//! # x86-64
//!
//! 4-level paging: PML4 → PDPT → PD → PT, 512 entries each, with 1 GiB and
//! 2 MiB leaves where alignment allows. Process addresses are limited to the
//! canonical lower half.

use std::collections::BTreeMap;

use plan_model::{Chip, PlatformKind, Project};
use plan_pgtbl::{Level, PgtblShape};

use crate::options::Options;
use crate::{Geometry, PlatformError, check_addresses, check_vectors};

const PLATFORM: &str = "X64";
const WORD: u64 = 8;
const ADDRESS_LIMIT: u64 = 1 << 47;
/// Vectors below 32 are processor exceptions.
const FIRST_VECTOR: u32 = 32;
const VECTOR_LIMIT: u32 = 256;

const CAPTBL_CAPACITY: u32 = 256;
const KMEM_ORDER: u32 = 5;
const SLOT_WORDS: u64 = 4;
const NODE_HEADER_WORDS: u64 = 4;
/// PCID and CR3 image kept with the top node.
const TOP_EXTRA_WORDS: u64 = 4;
const THREAD_WORDS: u64 = 16 + 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X64 {
    xsave_size: u32,
    shape: PgtblShape,
}

impl X64 {
    #[must_use]
    pub const fn xsave_size(&self) -> u32 {
        self.xsave_size
    }
}

impl Geometry for X64 {
    const KIND: PlatformKind = PlatformKind::X64;

    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn word_bits(&self) -> u32 {
        64
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
        let extra = if is_top { TOP_EXTRA_WORDS } else { 0 };
        (NODE_HEADER_WORDS + (1 << num_order) + extra) * WORD
    }

    fn captbl_size(&self, slots: u32) -> u64 {
        u64::from(slots) * SLOT_WORDS * WORD
    }

    fn process_size(&self) -> u64 {
        4 * WORD
    }

    fn thread_size(&self) -> u64 {
        THREAD_WORDS * WORD + u64::from(self.xsave_size)
    }

    fn invocation_size(&self) -> u64 {
        8 * WORD
    }

    fn endpoint_size(&self) -> u64 {
        4 * WORD
    }

    fn stack_align(&self) -> u64 {
        16
    }

    fn parse_options(options: &BTreeMap<String, String>) -> Result<Self, PlatformError> {
        const EXPECTED: &str = "a multiple of 64 from 512 to 4096";

        let opts = Options::new(PLATFORM, options, &["XSAVE_Size"])?;
        let xsave_size = opts.int("XSAVE_Size", 512..=4096, 512, EXPECTED)?;
        if !xsave_size.is_multiple_of(64) {
            return Err(PlatformError::InvalidOption {
                platform: PLATFORM,
                key: "XSAVE_Size".into(),
                value: xsave_size.to_string(),
                expected: EXPECTED,
            });
        }

        let shape = PgtblShape::new(
            vec![Level::new(39, 9), Level::new(30, 9), Level::new(21, 9), Level::new(12, 9)],
            vec![30, 21, 12],
            false,
        )?;
        Ok(Self { xsave_size, shape })
    }

    fn check_input(&self, chip: &Chip, project: &Project) -> Result<(), PlatformError> {
        check_addresses(chip, project, ADDRESS_LIMIT)?;
        check_vectors(chip, FIRST_VECTOR, VECTOR_LIMIT)
    }
}
