//! # Physical and Virtual Address Types
//!
//! Strongly typed wrappers for the raw addresses the planner juggles, plus the
//! attribute set every memory region and mapping carries.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | Where bytes live in the chip's memory map. |
//! | [`VirtualAddress`] | Where a process sees them through its page table. |
//! | [`Section`] | A placed `[base, base + size)` range. |
//! | [`MemAttr`] | Read/write/execute/cache attributes of a region or mapping. |
//!
//! Keeping physical and virtual addresses apart matters even though most
//! targets identity-map: the page table builder takes both for every run and
//! a swapped pair would silently produce a wrong tree.
//!
//! ```rust
//! # use plan_memory::*;
//! let pa = PhysicalAddress::new(0x2000_1234);
//! assert_eq!(pa.align_down(12).as_u64(), 0x2000_1000);
//! assert!(!pa.is_aligned(12));
//!
//! let s = Section::new(0x2000_0000, 0x400);
//! assert!(s.contains(0x2000_03FF));
//! assert_eq!(s.end(), 0x2000_0400);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod attr;
mod section;

use core::fmt;
use core::ops::{Add, AddAssign};

pub use crate::attr::MemAttr;
pub use crate::section::Section;

/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use plan_memory::align_down;
/// assert_eq!(align_down(0,      32), 0);
/// assert_eq!(align_down(31,     32), 0);
/// assert_eq!(align_down(0x1234, 0x100), 0x1200);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// Returns `None` if the result does not fit into `u64`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use plan_memory::align_up;
/// assert_eq!(align_up(0,    32), Some(0));
/// assert_eq!(align_up(1,    32), Some(32));
/// assert_eq!(align_up(4097, 4096), Some(8192));
/// assert_eq!(align_up(u64::MAX, 32), None);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> Option<u64> {
    match x.checked_add(a - 1) {
        Some(v) => Some(v & !(a - 1)),
        None => None,
    }
}

/// Whether `x` is a multiple of `2^order`.
#[inline]
#[must_use]
pub const fn is_aligned(x: u64, order: u32) -> bool {
    order >= 64 || x & ((1u64 << order) - 1) == 0
}

/// Number of bytes covered by `2^order`, saturating at `u64::MAX` for
/// orders of 64 and up.
#[inline]
#[must_use]
pub const fn order_size(order: u32) -> u64 {
    if order >= 64 { u64::MAX } else { 1 << order }
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $short:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            #[must_use]
            pub const fn new(v: u64) -> Self {
                Self(v)
            }

            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self(0)
            }

            #[inline]
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Clear the low `order` bits.
            #[inline]
            #[must_use]
            pub const fn align_down(self, order: u32) -> Self {
                if order >= 64 {
                    return Self(0);
                }
                Self(align_down(self.0, 1 << order))
            }

            #[inline]
            #[must_use]
            pub const fn is_aligned(self, order: u32) -> bool {
                is_aligned(self.0, order)
            }

            /// `self + rhs`, or `None` on overflow.
            #[inline]
            #[must_use]
            pub const fn checked_add(self, rhs: u64) -> Option<Self> {
                match self.0.checked_add(rhs) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            /// Distance from `base` up to `self`.
            #[inline]
            #[must_use]
            pub const fn offset_from(self, base: Self) -> u64 {
                self.0 - base.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($short, "(0x{:08X})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(v: u64) -> Self {
                Self::new(v)
            }
        }

        impl From<$name> for u64 {
            #[inline]
            fn from(a: $name) -> Self {
                a.as_u64()
            }
        }

        impl Add<u64> for $name {
            type Output = Self;
            #[inline]
            fn add(self, rhs: u64) -> Self::Output {
                Self(self.0 + rhs)
            }
        }

        impl AddAssign<u64> for $name {
            #[inline]
            fn add_assign(&mut self, rhs: u64) {
                self.0 += rhs;
            }
        }
    };
}

address_type!(
    /// Physical memory address.
    ///
    /// Denotes a location in the chip's memory map (flash, RAM, MMIO) as
    /// declared by the chip description.
    PhysicalAddress,
    "PA"
);

address_type!(
    /// Virtual memory address.
    ///
    /// Denotes a location as seen through a process page table. The planner
    /// identity-maps today, but the types stay distinct so the page table
    /// builder never confuses the two sides of a mapping run.
    VirtualAddress,
    "VA"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(0x12345, 0x1000), 0x12000);
        assert_eq!(align_up(0x12345, 0x1000), Some(0x13000));
        assert_eq!(align_up(0x13000, 0x1000), Some(0x13000));
        assert!(is_aligned(0x4000_0000, 30));
        assert!(!is_aligned(0x4000_1000, 30));
        assert!(is_aligned(0, 64));
    }

    #[test]
    fn typed_addresses() {
        let va = VirtualAddress::new(0x0010_2345);
        assert_eq!(va.align_down(20).as_u64(), 0x0010_0000);
        assert_eq!(va.offset_from(VirtualAddress::new(0x0010_0000)), 0x2345);
        assert_eq!(va.checked_add(u64::MAX), None);

        let mut pa = PhysicalAddress::zero();
        pa += 0x40;
        assert_eq!(pa, PhysicalAddress::new(0x40));
        assert_eq!(format!("{pa}"), "0x00000040");
        assert_eq!(format!("{pa:?}"), "PA(0x00000040)");
    }

    #[test]
    fn order_size_saturates() {
        assert_eq!(order_size(5), 32);
        assert_eq!(order_size(64), u64::MAX);
    }
}
