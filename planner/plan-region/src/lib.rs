//! # Region Map
//!
//! Bitmap fitter over the memory regions a chip declares. Every region gets
//! one [`RegionMap`] with one bit per 32-byte unit; a set bit means the unit
//! belongs to some placed section.
//!
//! ```text
//!  region 0x2000_0000 .. 0x2000_0100   (8 units)
//!
//!  unit:   0   1   2   3   4   5   6   7
//!  bit:   [1] [1] [0] [0] [1] [0] [0] [0]
//!          \_____/         |
//!         kernel data    flags
//! ```
//!
//! Two entry points place requests:
//!
//! - [`fit_static`] commits a request at a fixed address. The address range
//!   must lie in the one declared region of the right kind whose attributes
//!   admit the request.
//! - [`fit_auto`] scans regions in declaration order and candidates upward from
//!   each region's base, committing the first free, suitably aligned range.
//!   Regions marked static-only are never considered.
//!
//! Both are deterministic: the same sequence of requests over the same regions
//! always yields the same addresses.
//!
//! ```rust
//! # use plan_region::*;
//! # use plan_memory::MemAttr;
//! let ram = MemoryRegion::new("ram", RegionKind::Data, 0x2000_0000, 0x100, MemAttr::RW);
//! let mut maps = build_maps([ram]).unwrap();
//!
//! fit_static(&mut maps, RegionKind::Data, 0x2000_0000, 0x40, MemAttr::RW).unwrap();
//! let at = fit_auto(&mut maps, RegionKind::Data, 0x40, 0x40, MemAttr::RW).unwrap();
//! assert_eq!(at, 0x2000_0040);
//! assert_eq!(maps[0].free_bytes(), 0x80);
//! ```

use core::fmt;
use log::{debug, trace};
use plan_info::memory::{REGION_UNIT, REGION_UNIT_ORDER};
use plan_memory::{MemAttr, Section, align_up, is_aligned};

/// What a region (and a request) holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionKind {
    Code,
    Data,
    Device,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Code => "code",
            Self::Data => "data",
            Self::Device => "device",
        })
    }
}

/// A memory region as declared by the chip description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub kind: RegionKind,
    pub start: u64,
    pub size: u64,
    pub attr: MemAttr,
    /// Placement granularity of auto-fitted requests.
    pub align: u64,
}

impl MemoryRegion {
    /// A region with the default 32-byte granularity.
    pub fn new(
        name: impl Into<String>,
        kind: RegionKind,
        start: u64,
        size: u64,
        attr: MemAttr,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            start,
            size,
            attr,
            align: REGION_UNIT,
        }
    }

    #[must_use]
    pub const fn with_align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    #[inline]
    #[must_use]
    pub const fn section(&self) -> Section {
        Section::new(self.start, self.size)
    }

    /// Whether the region only takes fixed-address placements.
    #[inline]
    #[must_use]
    pub fn is_static_only(&self) -> bool {
        self.attr.static_only()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FitError {
    #[error("invalid region `{name}`: {reason}")]
    InvalidRegion { name: String, reason: &'static str },
    #[error("regions `{first}` and `{second}` overlap")]
    RegionsOverlap { first: String, second: String },
    #[error("zero-sized {kind} request")]
    EmptyRequest { kind: RegionKind },
    #[error("alignment {align:#x} is not a power of two")]
    BadAlignment { align: u64 },
    #[error(
        "{kind} request [{start:#x}, +{size:#x}) with {attr} lies outside every compatible declared region"
    )]
    OutsideDeclared {
        kind: RegionKind,
        start: u64,
        size: u64,
        attr: MemAttr,
    },
    #[error("{kind} request [{start:#x}, +{size:#x}) overlaps an occupied range of region `{region}`")]
    Overlap {
        region: String,
        kind: RegionKind,
        start: u64,
        size: u64,
    },
    #[error("no free {kind} memory for {size:#x} bytes aligned to {align:#x} with {attr}")]
    Exhausted {
        kind: RegionKind,
        size: u64,
        align: u64,
        attr: MemAttr,
    },
}

/// Occupancy bitmap of one [`MemoryRegion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    region: MemoryRegion,
    units: u64,
    bits: Vec<u64>,
}

impl RegionMap {
    /// Creates an all-free map.
    ///
    /// # Errors
    /// [`FitError::InvalidRegion`] if the region is empty, not unit aligned,
    /// wraps the address space or carries a bad granularity.
    pub fn new(region: MemoryRegion) -> Result<Self, FitError> {
        let invalid = |reason| FitError::InvalidRegion {
            name: region.name.clone(),
            reason,
        };

        if region.size == 0 {
            return Err(invalid("region is empty"));
        }
        if !is_aligned(region.start, REGION_UNIT_ORDER)
            || !is_aligned(region.size, REGION_UNIT_ORDER)
        {
            return Err(invalid("start and size must be multiples of 32 bytes"));
        }
        if region.start.checked_add(region.size).is_none() {
            return Err(invalid("region wraps the address space"));
        }
        if !region.align.is_power_of_two() || region.align < REGION_UNIT {
            return Err(invalid("granularity must be a power of two of at least 32 bytes"));
        }

        let units = region.size >> REGION_UNIT_ORDER;
        let words = usize::try_from(units.div_ceil(64))
            .map_err(|_| invalid("region is too large to track"))?;

        Ok(Self {
            region,
            units,
            bits: vec![0; words],
        })
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> &MemoryRegion {
        &self.region
    }

    /// Whether every unit touching `[start, start + size)` is inside the
    /// region and free.
    #[must_use]
    pub fn try_range(&self, start: u64, size: u64) -> bool {
        self.unit_range(start, size)
            .is_some_and(|(first, last)| self.last_used(first, last).is_none())
    }

    /// Marks every unit touching `[start, start + size)` as occupied.
    ///
    /// Nothing is modified on failure.
    ///
    /// # Errors
    /// [`FitError::EmptyRequest`], [`FitError::OutsideDeclared`] if the range
    /// leaves the region, [`FitError::Overlap`] if any unit is taken.
    pub fn mark(&mut self, start: u64, size: u64) -> Result<(), FitError> {
        let kind = self.region.kind;
        if size == 0 {
            return Err(FitError::EmptyRequest { kind });
        }
        let Some((first, last)) = self.unit_range(start, size) else {
            return Err(FitError::OutsideDeclared {
                kind,
                start,
                size,
                attr: self.region.attr,
            });
        };
        if self.last_used(first, last).is_some() {
            return Err(FitError::Overlap {
                region: self.region.name.clone(),
                kind,
                start,
                size,
            });
        }

        for unit in first..last {
            let (word, bit) = slot(unit);
            self.bits[word] |= bit;
        }
        trace!("region `{}`: units {first}..{last} taken", self.region.name);
        Ok(())
    }

    /// Committed ranges in ascending address order, adjacent ones coalesced.
    pub fn occupied(&self) -> impl Iterator<Item = Section> + '_ {
        Occupied { map: self, unit: 0 }
    }

    /// Bytes not yet covered by any committed range.
    #[must_use]
    pub fn free_bytes(&self) -> u64 {
        let used: u64 = self.bits.iter().map(|w| u64::from(w.count_ones())).sum();
        (self.units - used) << REGION_UNIT_ORDER
    }

    /// Lowest `step`-aligned address where `size` bytes are free.
    fn first_fit(&self, size: u64, step: u64) -> Option<u64> {
        let base = self.region.start;
        let end = self.region.section().end();
        let mut candidate = align_up(base, step)?;

        loop {
            if candidate.checked_add(size)? > end {
                return None;
            }
            let (first, last) = self.unit_range(candidate, size)?;
            let Some(used) = self.last_used(first, last) else {
                return Some(candidate);
            };
            // Every candidate up to the blocking unit still covers it.
            let after = base + ((used + 1) << REGION_UNIT_ORDER);
            trace!(
                "region `{}`: {candidate:#x} blocked at unit {used}",
                self.region.name
            );
            candidate = align_up(after, step)?;
        }
    }

    /// Unit indices `[first, last)` covering the byte range, rounded outward.
    fn unit_range(&self, start: u64, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        let end = start.checked_add(size)?;
        let section = self.region.section();
        if start < section.base || end > section.end() {
            return None;
        }
        let first = (start - section.base) >> REGION_UNIT_ORDER;
        let last = (end - section.base).div_ceil(REGION_UNIT);
        Some((first, last))
    }

    fn is_used(&self, unit: u64) -> bool {
        let (word, bit) = slot(unit);
        self.bits[word] & bit != 0
    }

    fn last_used(&self, first: u64, last: u64) -> Option<u64> {
        (first..last).rev().find(|&unit| self.is_used(unit))
    }
}

/// Word index and bit mask of `unit`. Units are bounded by the bitmap length,
/// which was checked to fit `usize` on construction.
#[allow(clippy::cast_possible_truncation)]
const fn slot(unit: u64) -> (usize, u64) {
    ((unit / 64) as usize, 1 << (unit % 64))
}

struct Occupied<'a> {
    map: &'a RegionMap,
    unit: u64,
}

impl Iterator for Occupied<'_> {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        let units = self.map.units;
        while self.unit < units && !self.map.is_used(self.unit) {
            self.unit += 1;
        }
        if self.unit == units {
            return None;
        }
        let first = self.unit;
        while self.unit < units && self.map.is_used(self.unit) {
            self.unit += 1;
        }
        Some(Section::new(
            self.map.region.start + (first << REGION_UNIT_ORDER),
            (self.unit - first) << REGION_UNIT_ORDER,
        ))
    }
}

/// Builds one map per region, in declaration order.
///
/// # Errors
/// Any [`RegionMap::new`] failure, or [`FitError::RegionsOverlap`] if two
/// declared regions share an address.
pub fn build_maps(
    regions: impl IntoIterator<Item = MemoryRegion>,
) -> Result<Vec<RegionMap>, FitError> {
    let mut maps: Vec<RegionMap> = Vec::new();
    for region in regions {
        let map = RegionMap::new(region)?;
        if let Some(other) = maps
            .iter()
            .find(|m| m.region.section().overlaps(&map.region.section()))
        {
            return Err(FitError::RegionsOverlap {
                first: other.region.name.clone(),
                second: map.region.name.clone(),
            });
        }
        maps.push(map);
    }
    Ok(maps)
}

/// Commits `[start, start + size)` in the declared region of `kind` that
/// encloses it and admits `attr`.
///
/// # Errors
/// [`FitError::EmptyRequest`], [`FitError::OutsideDeclared`] if no compatible
/// region encloses the range, [`FitError::Overlap`] if it is already taken.
pub fn fit_static(
    maps: &mut [RegionMap],
    kind: RegionKind,
    start: u64,
    size: u64,
    attr: MemAttr,
) -> Result<(), FitError> {
    if size == 0 {
        return Err(FitError::EmptyRequest { kind });
    }

    let Some(map) = maps.iter_mut().find(|m| {
        m.region.kind == kind
            && m.region.attr.admits(attr)
            && m.region.section().encloses(start, size)
    }) else {
        return Err(FitError::OutsideDeclared {
            kind,
            start,
            size,
            attr,
        });
    };

    if !map.try_range(start, size) {
        return Err(FitError::Overlap {
            region: map.region.name.clone(),
            kind,
            start,
            size,
        });
    }
    map.mark(start, size)?;

    debug!(
        "{kind} {} fixed in region `{}`",
        Section::new(start, size),
        map.region.name
    );
    Ok(())
}

/// Places `size` bytes of `kind` memory first-fit and returns the address.
///
/// The effective alignment is the coarser of `align` and the region's
/// granularity. An `align` of zero means "no constraint".
///
/// # Errors
/// [`FitError::EmptyRequest`], [`FitError::BadAlignment`], or
/// [`FitError::Exhausted`] if no region has room.
pub fn fit_auto(
    maps: &mut [RegionMap],
    kind: RegionKind,
    size: u64,
    align: u64,
    attr: MemAttr,
) -> Result<u64, FitError> {
    if size == 0 {
        return Err(FitError::EmptyRequest { kind });
    }
    let align = align.max(1);
    if !align.is_power_of_two() {
        return Err(FitError::BadAlignment { align });
    }

    for map in maps.iter_mut() {
        let region = &map.region;
        if region.kind != kind || region.is_static_only() || !region.attr.admits(attr) {
            continue;
        }

        let step = align.max(region.align);
        if let Some(at) = map.first_fit(size, step) {
            map.mark(at, size)?;
            debug!(
                "{kind} {} auto-placed in region `{}`",
                Section::new(at, size),
                map.region.name
            );
            return Ok(at);
        }
        trace!("region `{}` has no room for {size:#x} bytes", region.name);
    }

    Err(FitError::Exhausted {
        kind,
        size,
        align,
        attr,
    })
}
