//! Safe access to user memory.
//!
//! Kernel **MUST NOT** believe the user input. A user program might
//! maliciously or mistakenly pass a null pointer, a pointer into the kernel,
//! or a buffer whose tail runs into an unmapped page. Every address the kernel
//! is about to touch on behalf of a system call is therefore checked here
//! first:
//!
//! 1. It must lie in the user region `[USER_BASE, PHYS_BASE)`.
//! 2. It must be mapped in the address space of the calling process (and
//!    writable, when the kernel is about to write into it).
//!
//! Buffers are checked page by page over their whole extent **before** the
//! first byte is copied, because a buffer may span an unmapped page in its
//! interior. Strings are checked byte by byte, because their length is only
//! known once the terminator is found.
//!
//! A failed check is reported as [`KernelError::BadAddress`], which the system
//! call entry turns into the termination of the calling process. It never
//! stops the kernel.
//!
//! The accessor types take ownership of themselves on use, so a user pointer
//! is checked and used exactly once:
//! - [`UserPtrRO`]: a value (a syscall word) read from user memory.
//! - [`UserCString`]: a NUL-terminated string (a path, a command line).
//! - [`UserU8SliceRO`]: a byte buffer the kernel reads (`write`).
//! - [`UserU8SliceWO`]: a byte buffer the kernel fills (`read`).

use alloc::{string::String, vec, vec::Vec};
use kbase::{
    KernelError,
    addressing::{Kva, PHYS_BASE, Va},
    mm::{AddressSpace, Mapping},
};

/// Checks that `va` is a mapped user address.
pub fn validate_pointer(aspace: &dyn AddressSpace, va: Va) -> Result<Mapping, KernelError> {
    if !va.is_user() {
        return Err(KernelError::BadAddress);
    }
    aspace
        .translate(va)
        .filter(Mapping::is_readable)
        .ok_or(KernelError::BadAddress)
}

/// Checks `va` and returns where the kernel can reach the byte it names.
pub fn translate(aspace: &dyn AddressSpace, va: Va) -> Result<Kva, KernelError> {
    validate_pointer(aspace, va).map(|mapping| mapping.kva)
}

/// A user buffer whose every page has been checked.
///
/// It keeps, for each page the buffer touches, where that part of the buffer
/// lives in kernel memory.
#[derive(Debug)]
struct CheckedRange {
    chunks: Vec<(Kva, usize)>,
    len: usize,
}

impl CheckedRange {
    fn copy_out(&self) -> Vec<u8> {
        let mut out = vec![0; self.len];
        let mut off = 0;
        for &(kva, len) in self.chunks.iter() {
            kva.read_bytes(&mut out[off..off + len]);
            off += len;
        }
        out
    }

    fn copy_in(&self, data: &[u8]) -> usize {
        let size = self.len.min(data.len());
        let mut off = 0;
        for &(kva, len) in self.chunks.iter() {
            if off >= size {
                break;
            }
            let len = len.min(size - off);
            kva.write_bytes(&data[off..off + len]);
            off += len;
        }
        size
    }
}

/// Checks every byte of `[addr, addr + len)`.
///
/// With `write`, every page must also be writable by the user.
fn validate_buffer(
    aspace: &dyn AddressSpace,
    addr: usize,
    len: usize,
    write: bool,
) -> Result<CheckedRange, KernelError> {
    let end = addr.checked_add(len).ok_or(KernelError::BadAddress)?;
    if len != 0 && end > PHYS_BASE {
        return Err(KernelError::BadAddress);
    }
    let mut chunks = Vec::new();
    let mut va = Va::new(addr);
    let mut left = len;
    while left > 0 {
        let mapping = validate_pointer(aspace, va)?;
        if write && !mapping.is_writable() {
            return Err(KernelError::BadAddress);
        }
        let chunk = left
            .min(va.bytes_left_in_page())
            .min(mapping.kva.bytes_left_in_page());
        chunks.push((mapping.kva, chunk));
        left -= chunk;
        va = va + chunk;
    }
    Ok(CheckedRange { chunks, len })
}

/// Plain values that can be read out of user memory.
pub trait UserValue: Copy {
    /// The size of the value in user memory.
    const SIZE: usize;

    /// Decodes the value from its little-endian representation.
    fn from_le(bytes: &[u8]) -> Self;
}

impl UserValue for u8 {
    const SIZE: usize = 1;

    fn from_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl UserValue for u32 {
    const SIZE: usize = 4;

    fn from_le(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl UserValue for i32 {
    const SIZE: usize = 4;

    fn from_le(bytes: &[u8]) -> Self {
        <u32 as UserValue>::from_le(bytes) as i32
    }
}

/// A one-time, read-only pointer to a user-space object of type `T`.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserPtrRO<T>
where
    T: UserValue,
{
    addr: usize,
    _ty: core::marker::PhantomData<T>,
}

impl<T> UserPtrRO<T>
where
    T: UserValue,
{
    /// Creates a new `UserPtrRO` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        UserPtrRO {
            addr,
            _ty: core::marker::PhantomData,
        }
    }

    /// Reads a value of type `T` from the user-space address.
    ///
    /// Every byte of the value is checked, so a value straddling two pages
    /// needs both pages mapped.
    pub fn get(self, aspace: &dyn AddressSpace) -> Result<T, KernelError> {
        let bytes = validate_buffer(aspace, self.addr, T::SIZE, false)?.copy_out();
        Ok(T::from_le(&bytes))
    }
}

/// A one-time, read-only pointer to a slice of `u8` in user-space.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserU8SliceRO {
    addr: usize,
    len: usize,
}

impl UserU8SliceRO {
    /// Creates a new `UserU8SliceRO` instance with the given user-space address
    /// and length.
    pub fn new(addr: usize, len: usize) -> Self {
        UserU8SliceRO { addr, len }
    }

    /// The length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads data from the user-space buffer into a `Vec<u8>`.
    ///
    /// Returns `Err(KernelError::BadAddress)` without copying anything if
    /// any byte of the buffer is not accessible.
    pub fn get(self, aspace: &dyn AddressSpace) -> Result<Vec<u8>, KernelError> {
        Ok(validate_buffer(aspace, self.addr, self.len, false)?.copy_out())
    }
}

/// A one-time, write-only pointer to a slice of `u8` in user-space.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserU8SliceWO {
    addr: usize,
    len: usize,
}

impl UserU8SliceWO {
    /// Creates a new `UserU8SliceWO` instance with the given user-space address
    /// and length.
    pub fn new(addr: usize, len: usize) -> Self {
        UserU8SliceWO { addr, len }
    }

    /// The length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks that the whole buffer is mapped and writable.
    ///
    /// The check happens before the kernel produces the data, so that a bad
    /// buffer fails the call before it has any side effect.
    pub fn validate(self, aspace: &dyn AddressSpace) -> Result<UserBufferMut, KernelError> {
        Ok(UserBufferMut {
            range: validate_buffer(aspace, self.addr, self.len, true)?,
        })
    }
}

/// A validated, writable user buffer.
#[derive(Debug)]
pub struct UserBufferMut {
    range: CheckedRange,
}

impl UserBufferMut {
    /// The length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.range.len
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.range.len == 0
    }

    /// Copies `data` to the start of the buffer.
    ///
    /// Returns the number of bytes copied, which is at most the buffer length.
    pub fn put(self, data: &[u8]) -> usize {
        self.range.copy_in(data)
    }
}

/// A pointer to a null-terminated C-style string in user-space.
#[derive(PartialEq, PartialOrd, Eq, Ord, Debug)]
pub struct UserCString {
    addr: usize,
}

impl UserCString {
    /// Creates a new `UserCString` instance with the given user-space address.
    pub fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Reads a null-terminated string from the user-space address.
    ///
    /// Each byte is translated on its own before it is read, so reading
    /// stops with `Err(KernelError::BadAddress)` at the first inaccessible
    /// byte, never past it. A string that is not valid UTF-8 is
    /// `Err(KernelError::InvalidArgument)`.
    pub fn read(self, aspace: &dyn AddressSpace) -> Result<String, KernelError> {
        let mut va = Va::new(self.addr);
        let mut result = Vec::new();
        loop {
            match translate(aspace, va)?.read_u8() {
                0 => {
                    return String::from_utf8(result).map_err(|_| KernelError::InvalidArgument);
                }
                b => {
                    result.push(b);
                    va = va.checked_add(1).ok_or(KernelError::BadAddress)?;
                }
            }
        }
    }
}
