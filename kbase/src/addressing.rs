//! Virtual memory addressing for the user/kernel boundary.
//!
//! The user program sees a flat 32-bit virtual address space. The lower part,
//! from [`USER_BASE`] up to [`PHYS_BASE`], belongs to the user program; every
//! address from [`PHYS_BASE`] upward belongs to the kernel. The first pages
//! below [`USER_BASE`] are never handed to a user program, so that null
//! pointers and small integers mistaken for pointers can never reach mapped
//! memory.
//!
//! This module defines two address types:
//! - [`Va`]: a virtual address as seen by the user program. It is only a
//!   number; nothing can be read through it.
//! - [`Kva`]: a kernel virtual address, obtained by translating a mapped user
//!   address through the memory subsystem. Bytes are accessed only through
//!   [`Kva`].
//!
//! ## Example Usage:
//!
//! ```
//! use kbase::addressing::{Va, PAGE_SIZE};
//!
//! let va = Va::new(0x0804_8123);
//! assert!(va.is_user());
//! assert_eq!(va.page_down().into_usize(), 0x0804_8000);
//! assert_eq!(va.page_offset(), 0x123);
//! assert_eq!(va.bytes_left_in_page(), PAGE_SIZE - 0x123);
//! ```

/// The size of a single page in memory, in bytes.
pub const PAGE_SIZE: usize = 0x1000;

/// A mask for extracting the offset within a page from a given address.
pub const PAGE_MASK: usize = 0xfff;

/// The lowest address a user program may hand to the kernel.
///
/// This is where the program image of a user process starts; everything
/// below is reserved so that stray low addresses always fault.
pub const USER_BASE: usize = 0x0804_8000;

/// The first kernel address; user addresses lie strictly below it.
pub const PHYS_BASE: usize = 0xc000_0000;

/// Represents a user virtual address.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Va(usize);

impl Va {
    /// Creates a new virtual address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Cast the virtual address into the raw `usize`.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Returns true if the address lies in the user region
    /// `[USER_BASE, PHYS_BASE)`.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 >= USER_BASE && self.0 < PHYS_BASE
    }

    /// Align down to the start of the page containing this address.
    #[inline]
    pub const fn page_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// The byte offset of this address within its page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// The number of bytes from this address to the end of its page.
    #[inline]
    pub const fn bytes_left_in_page(self) -> usize {
        PAGE_SIZE - self.page_offset()
    }

    /// Adds `off` bytes to the address, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, off: usize) -> Option<Self> {
        match self.0.checked_add(off) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }
}

impl core::ops::Add<usize> for Va {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl core::fmt::Debug for Va {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Va(0x{:x})", self.0)
    }
}

/// Represents a kernel virtual address.
///
/// A [`Kva`] is produced by the memory subsystem when it translates a mapped
/// user address. The memory behind it stays valid until the end of the page
/// it points into, which is what every accessor below relies on: none of them
/// crosses a page boundary.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Kva(usize);

impl Kva {
    /// Creates a kernel virtual address.
    ///
    /// # Safety
    /// `addr` must point to kernel-accessible memory that is valid for reads
    /// and writes from `addr` up to the end of its page, for as long as the
    /// user mapping it was translated from stays in place.
    #[inline]
    pub const unsafe fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Cast the kernel virtual address into the raw `usize`.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// The number of bytes from this address to the end of its page.
    #[inline]
    pub const fn bytes_left_in_page(self) -> usize {
        PAGE_SIZE - (self.0 & PAGE_MASK)
    }

    /// Reads the byte at this address.
    pub fn read_u8(self) -> u8 {
        // Safety: `Kva::new` guarantees that the byte at `self` is readable.
        unsafe { (self.0 as *const u8).read_volatile() }
    }

    /// Copies `dst.len()` bytes starting at this address into `dst`.
    ///
    /// # Panics
    /// Panics if the copy would cross the end of the page.
    pub fn read_bytes(self, dst: &mut [u8]) {
        assert!(dst.len() <= self.bytes_left_in_page());
        // Safety: the source range stays inside the page, which `Kva::new`
        // guarantees to be readable, and cannot overlap a kernel slice.
        unsafe {
            core::ptr::copy_nonoverlapping(self.0 as *const u8, dst.as_mut_ptr(), dst.len());
        }
    }

    /// Copies `src` into memory starting at this address.
    ///
    /// # Panics
    /// Panics if the copy would cross the end of the page.
    pub fn write_bytes(self, src: &[u8]) {
        assert!(src.len() <= self.bytes_left_in_page());
        // Safety: the destination range stays inside the page, which
        // `Kva::new` guarantees to be writable.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), self.0 as *mut u8, src.len());
        }
    }
}

impl core::fmt::Debug for Kva {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Kva(0x{:x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_range_bounds() {
        assert!(!Va::new(0).is_user());
        assert!(!Va::new(PAGE_SIZE).is_user());
        assert!(!Va::new(USER_BASE - 1).is_user());
        assert!(Va::new(USER_BASE).is_user());
        assert!(Va::new(PHYS_BASE - 1).is_user());
        assert!(!Va::new(PHYS_BASE).is_user());
    }

    #[test]
    fn page_arithmetic() {
        let va = Va::new(0x0804_9ffe);
        assert_eq!(va.page_down(), Va::new(0x0804_9000));
        assert_eq!(va.bytes_left_in_page(), 2);
        assert_eq!(Va::new(usize::MAX).checked_add(1), None);
    }

    #[test]
    fn kva_copies_stay_in_page() {
        #[repr(align(4096))]
        struct Page([u8; PAGE_SIZE]);
        let mut page = Page([0; PAGE_SIZE]);
        let base = page.0.as_mut_ptr() as usize;

        let kva = unsafe { Kva::new(base + PAGE_SIZE - 3) };
        kva.write_bytes(b"abc");
        let mut out = [0u8; 3];
        kva.read_bytes(&mut out);
        assert_eq!(&out, b"abc");
        assert_eq!(kva.read_u8(), b'a');
        assert_eq!(kva.bytes_left_in_page(), 3);
        assert_eq!(&page.0[PAGE_SIZE - 3..], b"abc");
    }
}
