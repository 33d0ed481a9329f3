use core::fmt;

/// Bitfield of memory attributes (8-bit).
///
/// Layout (LSB→MSB):
/// - bit 0: read
/// - bit 1: write
/// - bit 2: execute
/// - bit 3: bufferable
/// - bit 4: cacheable
/// - bit 5: static
/// - bits 6..7: reserved
///
/// On a declared region `static_only` means the region only accepts
/// fixed-address placements. On a request the bit is ignored when checking
/// compatibility; see [`MemAttr::admits`].
#[bitfield_struct::bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct MemAttr {
    #[bits(1)]
    pub read: bool,
    #[bits(1)]
    pub write: bool,
    #[bits(1)]
    pub execute: bool,
    #[bits(1)]
    pub bufferable: bool,
    #[bits(1)]
    pub cacheable: bool,
    #[bits(1)]
    pub static_only: bool,
    #[bits(2)]
    __: u8,
}

impl MemAttr {
    const STATIC_BIT: u8 = 1 << 5;

    /// Read only.
    pub const R: Self = Self::new().with_read(true);
    /// Read + write.
    pub const RW: Self = Self::R.with_write(true);
    /// Read + execute.
    pub const RX: Self = Self::R.with_execute(true);
    /// Read + write + execute.
    pub const RWX: Self = Self::RW.with_execute(true);

    /// Whether every attribute set in `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.into_bits() & other.into_bits() == other.into_bits()
    }

    /// Whether a region carrying `self` can host a request carrying `request`.
    ///
    /// The request's static bit is not an access right and is masked out.
    #[inline]
    #[must_use]
    pub const fn admits(self, request: Self) -> bool {
        let wanted = request.into_bits() & !Self::STATIC_BIT;
        self.into_bits() & wanted == wanted
    }

    /// Union of both attribute sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }
}

impl fmt::Display for MemAttr {
    /// Renders as `RWXBCS`, with `-` for cleared attributes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.read(), 'R'),
            (self.write(), 'W'),
            (self.execute(), 'X'),
            (self.bufferable(), 'B'),
            (self.cacheable(), 'C'),
            (self.static_only(), 'S'),
        ];
        for (set, c) in flags {
            fmt::Write::write_char(f, if set { c } else { '-' })?;
        }
        Ok(())
    }
}
