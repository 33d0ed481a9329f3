//! # Platform Geometry
//!
//! Everything the planner needs to know about a target family, behind one
//! trait. The allocators never look at the platform directly; they ask a
//! [`Geometry`] for word width, table capacity, object footprints and the
//! page table shape.
//!
//! | Family | Feature | Word | Translation | Root |
//! |--------|---------|------|-------------|------|
//! | [`A7m`] | `a7m` | 32 | MPU region tree, 8 subregions per level, 32 B .. 4 GiB | floating |
//! | [`A7a`] | `a7a` | 32 | short-descriptor section table + page tables, 16 MiB / 1 MiB / 4 KiB | fixed, 4 GiB |
//! | [`X64`] | `x64` | 64 | 4-level paging, 1 GiB / 2 MiB / 4 KiB | fixed, 256 TiB |
//!
//! A geometry is created from the chip's raw options with
//! [`Geometry::parse_options`], which rejects unknown keys and fills in
//! defaults for missing ones.

mod options;

#[cfg(feature = "a7a")]
mod a7a;
#[cfg(feature = "a7m")]
mod a7m;
#[cfg(feature = "x64")]
mod x64;

use std::collections::BTreeMap;

use plan_model::{Chip, MemReq, Place, PlatformKind, Project};
use plan_pgtbl::{MapRun, PageTable, PgtblError, PgtblShape};

#[cfg(feature = "a7a")]
pub use crate::a7a::{A7a, A7aFpu};
#[cfg(feature = "a7m")]
pub use crate::a7m::{A7m, A7mFpu};
#[cfg(feature = "x64")]
pub use crate::x64::X64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("{platform}: unknown chip option `{key}`")]
    UnknownOption { platform: &'static str, key: String },
    #[error("{platform}: option `{key}` = `{value}` is invalid, expected {expected}")]
    InvalidOption {
        platform: &'static str,
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("vector `{name}` number {number} is out of range (limit {limit})")]
    VectorOutOfRange { name: String, number: u32, limit: u32 },
    #[error("{what} ends beyond the {limit:#x} address limit")]
    AddressOutOfRange { what: String, limit: u64 },
    #[error("fixed base {base:#x} is not aligned to the {granule:#x}-byte mapping granule")]
    Misaligned { base: u64, granule: u64 },
    #[error("alignment {align:#x} is not a power of two")]
    BadAlignment { align: u64 },
    #[error("size {size:#x} overflows when rounded to the mapping granule")]
    SizeOverflow { size: u64 },
    #[error("{what} needs {used} protection regions, the chip has {limit}")]
    TooManyRegions { what: String, used: usize, limit: u32 },
    #[error(transparent)]
    Shape(#[from] PgtblError),
}

/// A target family's sizes, shapes and input rules.
pub trait Geometry: Sized {
    const KIND: PlatformKind;

    fn name(&self) -> &'static str;

    fn word_bits(&self) -> u32;

    #[inline]
    fn word_bytes(&self) -> u64 {
        u64::from(self.word_bits() / 8)
    }

    /// Objects one capability table node holds, itself included.
    fn captbl_capacity(&self) -> u32;

    /// log2 of the kernel memory slot; footprints round up to it.
    fn kmem_order(&self) -> u32;

    fn shape(&self) -> &PgtblShape;

    /// Kernel memory of a page table node with `2^num_order` entries.
    fn pgtbl_size(&self, num_order: u32, is_top: bool) -> u64;

    /// Kernel memory of a capability table node with `slots` slots.
    fn captbl_size(&self, slots: u32) -> u64;

    fn process_size(&self) -> u64;

    fn thread_size(&self) -> u64;

    fn invocation_size(&self) -> u64;

    /// Receive endpoints and interrupt endpoints.
    fn endpoint_size(&self) -> u64;

    /// Minimum alignment of a thread or invocation stack.
    fn stack_align(&self) -> u64;

    /// Builds the geometry from raw chip options.
    ///
    /// # Errors
    /// [`PlatformError::UnknownOption`] or [`PlatformError::InvalidOption`].
    fn parse_options(options: &BTreeMap<String, String>) -> Result<Self, PlatformError>;

    /// Target rules the generic checks do not cover.
    ///
    /// # Errors
    /// Vector numbers or addresses the target cannot express.
    fn check_input(&self, chip: &Chip, project: &Project) -> Result<(), PlatformError>;

    /// Rounds a code or data request to the finest mapping granule: the size
    /// is rounded up, the alignment raised, a fixed base must already sit on
    /// the granule.
    ///
    /// # Errors
    /// [`PlatformError::Misaligned`], [`PlatformError::BadAlignment`] or
    /// [`PlatformError::SizeOverflow`].
    fn align_mem(&self, req: &MemReq) -> Result<MemReq, PlatformError> {
        let granule = 1u64 << self.shape().unit_order();
        if req.align != 0 && !req.align.is_power_of_two() {
            return Err(PlatformError::BadAlignment { align: req.align });
        }
        if let Place::Fixed(base) = req.place
            && !base.is_multiple_of(granule)
        {
            return Err(PlatformError::Misaligned { base, granule });
        }
        let size = req
            .size
            .checked_next_multiple_of(granule)
            .ok_or(PlatformError::SizeOverflow { size: req.size })?;

        Ok(MemReq {
            place: req.place,
            size,
            align: req.align.max(granule),
            attr: req.attr,
        })
    }

    /// Builds a page table of this target's shape.
    ///
    /// # Errors
    /// See [`PgtblError`].
    fn alloc_pgtbl(&self, runs: &[MapRun]) -> Result<PageTable, PgtblError> {
        plan_pgtbl::build(self.shape(), runs)
    }

    /// Target limits on a finished table, such as the number of protection
    /// regions one address space may use.
    ///
    /// # Errors
    /// [`PlatformError::TooManyRegions`].
    fn check_pgtbl(&self, _owner: &str, _table: &PageTable) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Checks that every declared region and every fixed address ends at or
/// below `limit`.
///
/// # Errors
/// [`PlatformError::AddressOutOfRange`] naming the first offender.
pub fn check_addresses(chip: &Chip, project: &Project, limit: u64) -> Result<(), PlatformError> {
    let fits = |base: u64, size: u64| base.checked_add(size).is_some_and(|end| end <= limit);
    let out = |what: String| PlatformError::AddressOutOfRange { what, limit };

    for r in &chip.regions {
        if !fits(r.start, r.size) {
            return Err(out(format!("region `{}`", r.name)));
        }
    }

    let kernel = &project.kernel;
    let runtime = &project.runtime;
    let fixed = [
        ("kernel code", &kernel.code),
        ("kernel data", &kernel.data),
        ("kernel memory", &kernel.kmem),
        ("runtime code", &runtime.code),
        ("runtime data", &runtime.data),
    ];
    for (what, req) in fixed {
        if let Place::Fixed(base) = req.place
            && !fits(base, req.size)
        {
            return Err(out(what.to_owned()));
        }
    }

    for p in &project.processes {
        for (i, seg) in p.segments.iter().enumerate() {
            if let Place::Fixed(base) = seg.req.place
                && !fits(base, seg.req.size)
            {
                return Err(out(format!("process `{}` segment {i}", p.name)));
            }
        }
        let entries = p
            .threads
            .iter()
            .map(|t| (&t.name, t.entry))
            .chain(p.invocations.iter().map(|i| (&i.name, i.entry)));
        for (name, entry) in entries {
            if let Place::Fixed(addr) = entry
                && !fits(addr, 1)
            {
                return Err(out(format!("entry of `{}` in process `{}`", name, p.name)));
            }
        }
    }
    Ok(())
}

/// Checks that every chip vector number lies in `first..limit`.
///
/// # Errors
/// [`PlatformError::VectorOutOfRange`].
pub fn check_vectors(chip: &Chip, first: u32, limit: u32) -> Result<(), PlatformError> {
    chip.vectors
        .iter()
        .find(|v| v.number < first || v.number >= limit)
        .map_or(Ok(()), |v| {
            Err(PlatformError::VectorOutOfRange {
                name: v.name.clone(),
                number: v.number,
                limit,
            })
        })
}
