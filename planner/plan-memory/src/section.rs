use core::fmt;

/// A placed memory range `[base, base + size)`.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Section {
    pub base: u64,
    pub size: u64,
}

impl Section {
    #[inline]
    #[must_use]
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// Exclusive end address.
    ///
    /// Sections are only ever built from fitted ranges, which never wrap.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base + self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    /// Whether `[base, base + size)` lies entirely inside this section.
    #[inline]
    #[must_use]
    pub const fn encloses(&self, base: u64, size: u64) -> bool {
        base >= self.base && size <= self.size && base - self.base <= self.size - size
    }

    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.base < other.end() && other.base < self.end()
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:08X}, +0x{:X})", self.base, self.size)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosure_and_overlap() {
        let s = Section::new(0x1000, 0x1000);
        assert!(s.encloses(0x1000, 0x1000));
        assert!(s.encloses(0x1F00, 0x100));
        assert!(!s.encloses(0x1F00, 0x101));
        assert!(!s.encloses(0x0F00, 0x100));

        assert!(s.overlaps(&Section::new(0x1FFF, 1)));
        assert!(!s.overlaps(&Section::new(0x2000, 0x10)));
        assert!(!s.overlaps(&Section::new(0x1800, 0)));
    }
}
