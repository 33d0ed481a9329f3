use crate::PgtblError;

/// One level of a page table: each node has `2^num_order` entries of
/// `2^size_order` bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Level {
    pub size_order: u32,
    pub num_order: u32,
}

impl Level {
    #[inline]
    #[must_use]
    pub const fn new(size_order: u32, num_order: u32) -> Self {
        Self {
            size_order,
            num_order,
        }
    }

    /// log2 of the bytes one node of this level covers.
    #[inline]
    #[must_use]
    pub const fn span_order(self) -> u32 {
        self.size_order + self.num_order
    }
}

/// Geometry of a target's translation tables.
///
/// - `levels` run from the top (coarsest) to the bottom (finest) level; each
///   child level covers exactly one entry of its parent.
/// - `granules` are the block sizes (log2 bytes) a leaf may have, coarsest
///   first. The finest granule is the size of a bottom-level entry and is the
///   unit mapping runs count in. A granule coarser than its level's entry
///   size (an ARMv7-A supersection) spans several consecutive entries.
/// - A floating root is not pinned to address 0: the tree starts at the
///   deepest node containing every mapping (MPU-style region trees).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PgtblShape {
    levels: Vec<Level>,
    granules: Vec<u32>,
    floating_root: bool,
}

impl PgtblShape {
    /// # Errors
    /// [`PgtblError::InvalidShape`] if the levels do not nest, the granules
    /// are not strictly decreasing, or the finest granule is not the bottom
    /// level's entry size.
    pub fn new(
        levels: Vec<Level>,
        granules: Vec<u32>,
        floating_root: bool,
    ) -> Result<Self, PgtblError> {
        let (Some(top), Some(bottom)) = (levels.first(), levels.last()) else {
            return Err(PgtblError::InvalidShape("no levels"));
        };
        if top.span_order() >= 64 {
            return Err(PgtblError::InvalidShape("top level covers 2^64 bytes or more"));
        }
        if levels.iter().any(|l| l.num_order == 0) {
            return Err(PgtblError::InvalidShape("level with a single entry"));
        }
        if levels
            .windows(2)
            .any(|w| w[1].span_order() != w[0].size_order)
        {
            return Err(PgtblError::InvalidShape("child level does not cover one parent entry"));
        }
        if granules.windows(2).any(|w| w[0] <= w[1]) {
            return Err(PgtblError::InvalidShape("granules must be strictly decreasing"));
        }
        match granules.last() {
            Some(&finest) if finest == bottom.size_order => {}
            _ => {
                return Err(PgtblError::InvalidShape(
                    "finest granule must be the bottom entry size",
                ));
            }
        }
        if granules[0] >= top.span_order() {
            return Err(PgtblError::InvalidShape("granule exceeds the address space"));
        }

        Ok(Self {
            levels,
            granules,
            floating_root,
        })
    }

    #[inline]
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[inline]
    #[must_use]
    pub fn granules(&self) -> &[u32] {
        &self.granules
    }

    #[inline]
    #[must_use]
    pub const fn is_floating(&self) -> bool {
        self.floating_root
    }

    /// log2 of the finest granule, the unit of [`MapRun::count`](crate::MapRun::count).
    #[inline]
    #[must_use]
    pub fn unit_order(&self) -> u32 {
        self.levels[self.levels.len() - 1].size_order
    }

    /// log2 of the address space the top level covers.
    #[inline]
    #[must_use]
    pub fn span_order(&self) -> u32 {
        self.levels[0].span_order()
    }
}
