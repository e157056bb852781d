//! System call ABI and decoding.
//!
//! A user program traps into the kernel with every system call argument on
//! its own stack, as 32-bit little-endian words:
//!
//! ```text
//!             +---------------+
//!  esp + 12   |     arg 2     |
//!             +---------------+
//!  esp + 8    |     arg 1     |
//!             +---------------+
//!  esp + 4    |     arg 0     |
//!             +---------------+
//!  esp        | syscall no.   |
//!             +---------------+
//! ```
//!
//! The result, if the call has one, is returned in `eax`.
//!
//! Each word is validated as user memory before it is read, and only the
//! words the call actually takes are read. [`Syscall::decode`] turns the raw
//! words into a typed request; pointers stay unchecked user pointers
//! ([`UserCString`], [`UserU8SliceRO`], [`UserU8SliceWO`]) until the handler
//! uses them.

use crate::{
    SyscallNumber,
    child::Pid,
    file_struct::FileDescriptor,
    uaccess::{UserCString, UserPtrRO, UserU8SliceRO, UserU8SliceWO},
};
use kbase::{KernelError, interrupt::Registers, mm::AddressSpace};

/// The size of a word on the user stack.
pub const WORD_SIZE: usize = 4;

/// A struct representing the system call ABI.
///
/// This struct provides a way to access and manipulate the system call's
/// arguments and return value in the context of the trap frame.
pub struct SyscallAbi<'a> {
    /// The system call number that identifies the requested system service.
    pub sysno: u32,
    regs: &'a mut Registers,
    aspace: &'a dyn AddressSpace,
}

impl<'a> SyscallAbi<'a> {
    /// Reads the system call number at the user stack pointer.
    ///
    /// Fails with [`KernelError::BadAddress`] if the stack pointer does not
    /// point at mapped user memory.
    pub fn from_registers(
        regs: &'a mut Registers,
        aspace: &'a dyn AddressSpace,
    ) -> Result<Self, KernelError> {
        let sysno = UserPtrRO::<u32>::new(regs.esp).get(aspace)?;
        Ok(Self {
            sysno,
            regs,
            aspace,
        })
    }

    /// Reads the first `N` argument words of the call.
    pub fn args<const N: usize>(&self) -> Result<[u32; N], KernelError> {
        let mut args = [0; N];
        for (i, arg) in args.iter_mut().enumerate() {
            let addr = self
                .regs
                .esp
                .checked_add(WORD_SIZE * (i + 1))
                .ok_or(KernelError::BadAddress)?;
            *arg = UserPtrRO::<u32>::new(addr).get(self.aspace)?;
        }
        Ok(args)
    }

    /// Sets the return value of the system call.
    ///
    /// Negative values reach the user as their two's complement word, so
    /// `-1` is `0xffff_ffff` in `eax`.
    pub fn set_return_value(self, value: i32) {
        self.regs.eax = value as u32;
    }
}

/// A decoded system call request.
#[derive(Debug, PartialEq, Eq)]
pub enum Syscall {
    /// `halt()`
    Halt,
    /// `exit(status)`
    Exit {
        /// Exit status reported to the parent.
        status: i32,
    },
    /// `exec(cmd_line)`
    Exec {
        /// Program name followed by its arguments.
        cmd_line: UserCString,
    },
    /// `wait(pid)`
    Wait {
        /// The child to wait for.
        pid: Pid,
    },
    /// `create(path, initial_size)`
    Create {
        /// Path of the file to create.
        path: UserCString,
        /// Size of the new file in bytes.
        initial_size: u32,
    },
    /// `remove(path)`
    Remove {
        /// Path of the file to remove.
        path: UserCString,
    },
    /// `open(path)`
    Open {
        /// Path of the file to open.
        path: UserCString,
    },
    /// `filesize(fd)`
    Filesize {
        /// An open file.
        fd: FileDescriptor,
    },
    /// `read(fd, buffer, size)`
    Read {
        /// Source of the bytes.
        fd: FileDescriptor,
        /// User buffer to fill.
        buf: UserU8SliceWO,
    },
    /// `write(fd, buffer, size)`
    Write {
        /// Destination of the bytes.
        fd: FileDescriptor,
        /// User buffer to write out.
        buf: UserU8SliceRO,
    },
    /// `seek(fd, position)`
    Seek {
        /// An open file.
        fd: FileDescriptor,
        /// New position, in bytes from the start of the file.
        position: u32,
    },
    /// `tell(fd)`
    Tell {
        /// An open file.
        fd: FileDescriptor,
    },
    /// `close(fd)`
    Close {
        /// The descriptor to close, or [`FileDescriptor::CLOSE_ALL`].
        fd: FileDescriptor,
    },
}

impl Syscall {
    /// Decodes the request in `abi`.
    ///
    /// An unknown number is [`KernelError::NoSuchSyscall`]; an argument word
    /// outside mapped user memory is [`KernelError::BadAddress`].
    pub fn decode(abi: &SyscallAbi) -> Result<Self, KernelError> {
        let sysno =
            SyscallNumber::try_from(abi.sysno).map_err(|_| KernelError::NoSuchSyscall)?;
        Ok(match sysno {
            SyscallNumber::Halt => Syscall::Halt,
            SyscallNumber::Exit => {
                let [status] = abi.args::<1>()?;
                Syscall::Exit {
                    status: status as i32,
                }
            }
            SyscallNumber::Exec => {
                let [cmd_line] = abi.args::<1>()?;
                Syscall::Exec {
                    cmd_line: UserCString::new(cmd_line as usize),
                }
            }
            SyscallNumber::Wait => {
                let [pid] = abi.args::<1>()?;
                Syscall::Wait {
                    pid: Pid(pid as i32),
                }
            }
            SyscallNumber::Create => {
                let [path, initial_size] = abi.args::<2>()?;
                Syscall::Create {
                    path: UserCString::new(path as usize),
                    initial_size,
                }
            }
            SyscallNumber::Remove => {
                let [path] = abi.args::<1>()?;
                Syscall::Remove {
                    path: UserCString::new(path as usize),
                }
            }
            SyscallNumber::Open => {
                let [path] = abi.args::<1>()?;
                Syscall::Open {
                    path: UserCString::new(path as usize),
                }
            }
            SyscallNumber::Filesize => {
                let [fd] = abi.args::<1>()?;
                Syscall::Filesize {
                    fd: FileDescriptor(fd as i32),
                }
            }
            SyscallNumber::Read => {
                let [fd, buf, size] = abi.args::<3>()?;
                Syscall::Read {
                    fd: FileDescriptor(fd as i32),
                    buf: UserU8SliceWO::new(buf as usize, size as usize),
                }
            }
            SyscallNumber::Write => {
                let [fd, buf, size] = abi.args::<3>()?;
                Syscall::Write {
                    fd: FileDescriptor(fd as i32),
                    buf: UserU8SliceRO::new(buf as usize, size as usize),
                }
            }
            SyscallNumber::Seek => {
                let [fd, position] = abi.args::<2>()?;
                Syscall::Seek {
                    fd: FileDescriptor(fd as i32),
                    position,
                }
            }
            SyscallNumber::Tell => {
                let [fd] = abi.args::<1>()?;
                Syscall::Tell {
                    fd: FileDescriptor(fd as i32),
                }
            }
            SyscallNumber::Close => {
                let [fd] = abi.args::<1>()?;
                Syscall::Close {
                    fd: FileDescriptor(fd as i32),
                }
            }
        })
    }
}
