//! The address-translation capability of the memory subsystem.
//!
//! The system call layer never walks page tables itself. It asks the address
//! space of the current process whether a user address is mapped, and if so,
//! where the kernel can reach the backing memory. Page table management,
//! paging policy and fault handling all live behind [`AddressSpace`].

use crate::addressing::{Kva, Va};

bitflags::bitflags! {
    /// Flags of a present user mapping.
    pub struct PteFlags: usize {
        /// Present; must be 1 to map a 4-KByte page
        const P = 1 << 0;
        /// Read/write; if 0, writes may not be allowed to the 4-KByte page referenced by this entry
        const RW = 1 << 1;
        /// User/supervisor; if 0, user-mode accesses are not allowed to the 4-KByte page referenced by this entry
        const US = 1 << 2;
    }
}

/// The result of translating a mapped user address.
#[derive(Debug, Clone, Copy)]
pub struct Mapping {
    /// Where the kernel can access the byte at the translated address.
    pub kva: Kva,
    /// The permission of the page containing the translated address.
    pub flags: PteFlags,
}

impl Mapping {
    /// Returns true if the user program may write through this mapping.
    pub fn is_writable(&self) -> bool {
        self.flags.contains(PteFlags::P | PteFlags::US | PteFlags::RW)
    }

    /// Returns true if the user program may read through this mapping.
    pub fn is_readable(&self) -> bool {
        self.flags.contains(PteFlags::P | PteFlags::US)
    }
}

/// The virtual address space of a user process.
pub trait AddressSpace: Send + Sync {
    /// Translates the user address `va`.
    ///
    /// Returns `None` if no page is mapped at `va`. The returned
    /// [`Mapping::kva`] points at the very byte `va` names, not at the start
    /// of its page. The kernel page behind it need not start where the user
    /// page does; callers copy no further than the nearer of the two page
    /// ends before translating again.
    fn translate(&self, va: Va) -> Option<Mapping>;
}
