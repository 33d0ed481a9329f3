//! # ARMv7-A
//!
//! Short-descriptor translation: a 4096-entry section table (1 MiB entries,
//! 16 MiB supersections spanning 16 consecutive entries) over 256-entry page
//! tables of 4 KiB pages. The section table always covers the full 4 GiB.

use std::collections::BTreeMap;

use plan_model::{Chip, PlatformKind, Project};
use plan_pgtbl::{Level, PgtblShape};

use crate::options::Options;
use crate::{Geometry, PlatformError, check_addresses, check_vectors};

const PLATFORM: &str = "A7A";
const WORD: u64 = 4;
const ADDRESS_LIMIT: u64 = 1 << 32;

const CAPTBL_CAPACITY: u32 = 128;
const KMEM_ORDER: u32 = 4;
const SLOT_WORDS: u64 = 4;
const NODE_HEADER_WORDS: u64 = 4;
/// ASID and translation table base kept with the top node.
const TOP_EXTRA_WORDS: u64 = 4;
const THREAD_WORDS: u64 = 16 + 17;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum A7aFpu {
    #[default]
    None,
    Vfpv3,
    Vfpv4,
}

impl A7aFpu {
    const fn context_words(self) -> u64 {
        match self {
            Self::None => 0,
            // 32 double registers, FPSCR and FPEXC.
            Self::Vfpv3 | Self::Vfpv4 => 64 + 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A7a {
    fpu: A7aFpu,
    gic_lines: u32,
    shape: PgtblShape,
}

impl A7a {
    #[must_use]
    pub const fn fpu(&self) -> A7aFpu {
        self.fpu
    }

    #[must_use]
    pub const fn gic_lines(&self) -> u32 {
        self.gic_lines
    }
}

impl Geometry for A7a {
    const KIND: PlatformKind = PlatformKind::A7A;

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
        let opts = Options::new(PLATFORM, options, &["FPU", "GIC_Lines"])?;
        let fpu = opts.choice(
            "FPU",
            &[
                ("None", A7aFpu::None),
                ("VFPV3", A7aFpu::Vfpv3),
                ("VFPV4", A7aFpu::Vfpv4),
            ],
            A7aFpu::None,
            "None, VFPV3 or VFPV4",
        )?;
        let gic_lines = opts.int("GIC_Lines", 32..=1020, 96, "32 to 1020")?;
        let shape = PgtblShape::new(
            vec![Level::new(20, 12), Level::new(12, 8)],
            vec![24, 20, 12],
            false,
        )?;

        Ok(Self {
            fpu,
            gic_lines,
            shape,
        })
    }

    fn check_input(&self, chip: &Chip, project: &Project) -> Result<(), PlatformError> {
        check_addresses(chip, project, ADDRESS_LIMIT)?;
        check_vectors(chip, 0, self.gic_lines)
    }
}
