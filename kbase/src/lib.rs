//! # kbase: kernel support for the user-program boundary
//!
//! `kbase` gathers the pieces of the kernel that the system-call layer builds
//! on, but does not own: the trap frame handed over by the interrupt entry,
//! virtual address types and the user/kernel split, the address-translation
//! capability of the memory subsystem, the filesystem and console device
//! interfaces, power control, and the synchronization primitives used to
//! coordinate kernel threads.
//!
//! Everything here is written against `core` and `alloc` only, so the same
//! code links into the bare-metal kernel image and runs under the host test
//! harness.
//!
//! ## Errors
//!
//! Every fallible kernel operation returns `Result<_, KernelError>`. Errors
//! incurred by the user **MUST NOT** stop the kernel: they are propagated with
//! the `?` operator up to the system call entry, which decides whether the
//! error becomes a return value or terminates the offending process.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

extern crate alloc;

pub mod addressing;
pub mod fs;
pub mod interrupt;
pub mod logging;
pub mod mm;
pub mod power;
pub mod sync;
pub mod task;
pub mod teletype;

/// Enum representing errors that can occur during a kernel operation.
///
/// This enum is used to categorize errors encountered by the kernel operation.
/// Each variant corresponds to a specific type of error that might
/// occur during the handling of a kernel operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    /// Operation is not permitted. (EPERM)
    OperationNotPermitted,
    /// No such file or directory. (ENOENT)
    NoSuchEntry,
    /// IO Error. (EIO)
    IOError,
    /// Exec format error, the program image could not be loaded. (ENOEXEC)
    NoExec,
    /// BAD file descriptor. (EBADF)
    BadFileDescriptor,
    /// No child process with the given pid. (ECHILD)
    NoSuchChild,
    /// Out of memory. (ENOMEM)
    NoMemory,
    /// Bad address. (EFAULT)
    BadAddress,
    /// File exists. (EEXIST)
    FileExist,
    /// Invalid arguement. (EINVAL)
    InvalidArgument,
    /// Too many open files. (EMFILE)
    TooManyOpenFile,
    /// No space left on device. (ENOSPC)
    NoSpace,
    /// Invalid system call number. (ENOSYS)
    NoSuchSyscall,
}

impl KernelError {
    /// Returns true if the error must terminate the process that caused it
    /// instead of being reported back as a return value.
    ///
    /// A user program that hands the kernel an unusable pointer or traps with
    /// an unknown system call number has violated the system call protocol;
    /// the kernel cannot meaningfully continue that program.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KernelError::BadAddress | KernelError::NoSuchSyscall)
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            KernelError::OperationNotPermitted => "operation not permitted",
            KernelError::NoSuchEntry => "no such file or directory",
            KernelError::IOError => "i/o error",
            KernelError::NoExec => "exec format error",
            KernelError::BadFileDescriptor => "bad file descriptor",
            KernelError::NoSuchChild => "no child processes",
            KernelError::NoMemory => "out of memory",
            KernelError::BadAddress => "bad address",
            KernelError::FileExist => "file exists",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::TooManyOpenFile => "too many open files",
            KernelError::NoSpace => "no space left on device",
            KernelError::NoSuchSyscall => "function not implemented",
        };
        f.write_str(msg)
    }
}
