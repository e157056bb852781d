//! # User programs and their system calls.
//!
//! A user program asks the kernel for services through **system calls**. It
//! pushes the number of the call and its arguments on its own stack and
//! traps; the kernel decodes the request, runs it on behalf of the program,
//! and places the result in the `eax` register before returning to user
//! mode.
//!
//! User programs are not trusted. Every pointer they pass is checked before
//! the kernel touches the memory behind it. A program that passes a bad
//! pointer, or asks for a system call that does not exist, is terminated with
//! exit status -1; it never brings the kernel down. Any other failure is
//! reported to the program as the result -1.
//!
//! ## Outline
//! - [`User Memory Access`]: Check and copy user memory.
//! - [`System Call Infrastructure`]: Decode system call requests.
//! - [`File System Calls`]: Files and the console, per process.
//! - [`Processes`]: `exec`, `wait` and `exit` between parents and children.
//! - [`Kernel`]: The shared services, configured with a [`KernelBuilder`].
//!
//! [`User Memory Access`]: uaccess
//! [`System Call Infrastructure`]: syscall
//! [`File System Calls`]: file_struct
//! [`Processes`]: child
//! [`Kernel`]: kernel::Kernel
//! [`KernelBuilder`]: kernel::KernelBuilder

#![cfg_attr(not(test), no_std)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod child;
pub mod file_struct;
pub mod fs_guard;
pub mod kernel;
pub mod process;
pub mod syscall;
pub mod uaccess;

use kbase::{
    KernelError,
    interrupt::Registers,
    task::{Disposition, Task},
};
use syscall::{Syscall, SyscallAbi};

pub use child::{ParentLink, Pid};
pub use file_struct::FileDescriptor;
pub use kernel::{Kernel, KernelBuilder, Launcher};
pub use process::Process;

/// Represents system call numbers.
///
/// Each variant corresponds to a specific system call that can be invoked
/// using the system call interface. The numeric values align with the
/// syscall table of the user library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u32)]
pub enum SyscallNumber {
    /// Powers off the machine.
    Halt = 0,
    /// Terminates the current process.
    Exit = 1,
    /// Starts a child process.
    Exec = 2,
    /// Waits for a child process to exit.
    Wait = 3,
    /// Creates a file.
    Create = 4,
    /// Removes a file.
    Remove = 5,
    /// Opens a file and returns a file descriptor.
    Open = 6,
    /// Returns the size of an open file.
    Filesize = 7,
    /// Reads data from a file descriptor.
    Read = 8,
    /// Writes data to a file descriptor.
    Write = 9,
    /// Moves the file offset of an open file.
    Seek = 10,
    /// Retrieves the current file offset.
    Tell = 11,
    /// Closes an open file descriptor.
    Close = 12,
}

impl Process {
    fn dispatch(&mut self, call: Syscall) -> Result<Option<i32>, KernelError> {
        Ok(match call {
            Syscall::Halt | Syscall::Exit { .. } => None,
            Syscall::Exec { cmd_line } => Some(self.exec(cmd_line)?.0),
            Syscall::Wait { pid } => Some(self.wait(pid)?),
            Syscall::Create { path, initial_size } => {
                Some(self.create(path, initial_size)? as i32)
            }
            Syscall::Remove { path } => Some(self.remove(path)? as i32),
            Syscall::Open { path } => Some(self.open(path)?.0),
            Syscall::Filesize { fd } => Some(self.filesize(fd)? as i32),
            Syscall::Read { fd, buf } => Some(self.read(fd, buf)? as i32),
            Syscall::Write { fd, buf } => Some(self.write(fd, buf)? as i32),
            Syscall::Seek { fd, position } => {
                self.seek(fd, position);
                None
            }
            Syscall::Tell { fd } => Some(self.tell(fd)? as i32),
            Syscall::Close { fd } => {
                self.close(fd);
                None
            }
        })
    }
}

impl Task for Process {
    /// Handles a system call request from a user program.
    ///
    /// The request is decoded from the user stack with
    /// [`SyscallAbi::from_registers`] and [`Syscall::decode`], then handed to
    /// the handler of the call. The result, for calls that have one, is
    /// stored in `eax` with [`SyscallAbi::set_return_value`].
    ///
    /// Errors are classified by [`KernelError::is_fatal`]: a fatal error
    /// terminates the process with status -1, any other error becomes the
    /// result -1.
    fn syscall(&mut self, regs: &mut Registers) -> Disposition {
        if let Some(status) = self.exit_status() {
            return Disposition::Exit(status);
        }
        if self.is_halted() {
            return Disposition::Halt;
        }
        let aspace = self.address_space().clone();
        let abi = match SyscallAbi::from_registers(regs, aspace.as_ref()) {
            Ok(abi) => abi,
            Err(e) => return self.kill(e),
        };
        let call = match Syscall::decode(&abi) {
            Ok(call) => call,
            Err(e) => return self.kill(e),
        };
        log::trace!("pid {}: {:?}", self.pid().0, call);
        match call {
            Syscall::Halt => return self.halt(),
            Syscall::Exit { status } => return self.exit(status),
            _ => (),
        }
        match self.dispatch(call) {
            Ok(Some(value)) => abi.set_return_value(value),
            Ok(None) => (),
            Err(e) if e.is_fatal() => return self.kill(e),
            Err(e) => {
                log::debug!("pid {}: syscall {} failed: {}", self.pid().0, abi.sysno, e);
                abi.set_return_value(-1);
            }
        }
        Disposition::Resume
    }

    fn user_fault(&mut self) -> Disposition {
        self.kill(KernelError::BadAddress)
    }
}
