//! # File state of a process.
//!
//! Processes interact with files through **file descriptors**, small integers
//! that index into the process's file descriptor table. The table maps each
//! descriptor to an open file handle living in kernel memory; user programs
//! never see the handle itself, only its descriptor.
//!
//! Two descriptors are reserved for the console and never appear in the
//! table:
//! - **Standard Input (stdin) - File Descriptor 0**: reads come from the
//!   console input device, one byte at a time.
//! - **Standard Output (stdout) - File Descriptor 1**: writes go to the
//!   console output device in a single call.
//!
//! Every other descriptor names a regular file opened by this process.
//! Descriptors are handed out from a per-process counter starting at 2; a
//! descriptor is never reused, even after it has been closed.
//!
//! The filesystem may not be entered by two threads at once. Every handler
//! here that calls into the filesystem, calls a file handle, or adds or drops
//! a table entry does so inside [`FsGuard::access`]. Console I/O does not
//! take the guard.
//!
//! [`FsGuard::access`]: crate::fs_guard::FsGuard::access

use crate::{kernel::Kernel, uaccess::UserBufferMut};
use alloc::{boxed::Box, collections::BTreeMap, vec, vec::Vec};
use kbase::{KernelError, fs::RegularFile};

/// Represents an index into a process’s file descriptor table.
///
/// A [`FileDescriptor`] is a wrapper around an `i32` that provides
/// stronger type safety when handling these indices in the kernel.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct FileDescriptor(pub i32);

impl FileDescriptor {
    /// The console input.
    pub const STDIN: FileDescriptor = FileDescriptor(0);
    /// The console output.
    pub const STDOUT: FileDescriptor = FileDescriptor(1);
    /// Passed to `close`, closes every open descriptor.
    pub const CLOSE_ALL: FileDescriptor = FileDescriptor(-1);
    /// The first descriptor handed out by `open`.
    pub const FIRST: FileDescriptor = FileDescriptor(2);
}

/// The [`FileStruct`] represents the file state of a specific process,
/// which corresponds to the Linux kernel's `struct files_struct`.
pub struct FileStruct {
    files: BTreeMap<FileDescriptor, Box<dyn RegularFile>>,
    next_fd: i32,
}

impl Default for FileStruct {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStruct {
    /// Creates an empty descriptor table.
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            next_fd: FileDescriptor::FIRST.0,
        }
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no file is open.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Installs an open file into the table and returns its descriptor.
    ///
    /// # Errors
    /// - Returns [`KernelError::TooManyOpenFile`] once every descriptor this
    ///   process can name has been handed out.
    pub fn install(&mut self, file: Box<dyn RegularFile>) -> Result<FileDescriptor, KernelError> {
        let fd = FileDescriptor(self.next_fd);
        self.next_fd = self
            .next_fd
            .checked_add(1)
            .ok_or(KernelError::TooManyOpenFile)?;
        self.files.insert(fd, file);
        Ok(fd)
    }

    /// Looks up the file behind `fd`.
    ///
    /// The console descriptors are not files; they are
    /// [`KernelError::BadFileDescriptor`] here like any unknown descriptor.
    pub fn get(&mut self, fd: FileDescriptor) -> Result<&mut Box<dyn RegularFile>, KernelError> {
        self.files
            .get_mut(&fd)
            .ok_or(KernelError::BadFileDescriptor)
    }

    /// Creates a file of `initial_size` bytes.
    ///
    /// Returns whether the file was created; a failure of the filesystem is
    /// `false`, not an error.
    pub fn create(&self, kernel: &Kernel, path: &str, initial_size: usize) -> bool {
        kernel
            .fs()
            .access(|fs| fs.create(path, initial_size))
            .inspect_err(|e| log::debug!("create `{path}`: {e}"))
            .is_ok()
    }

    /// Removes a file.
    ///
    /// Returns whether the file was removed. Files opened before stay usable.
    pub fn remove(&self, kernel: &Kernel, path: &str) -> bool {
        kernel
            .fs()
            .access(|fs| fs.remove(path))
            .inspect_err(|e| log::debug!("remove `{path}`: {e}"))
            .is_ok()
    }

    /// Opens a file and installs it in the table.
    ///
    /// Each call returns a new descriptor with its own position, even for a
    /// file that is already open.
    pub fn open(&mut self, kernel: &Kernel, path: &str) -> Result<FileDescriptor, KernelError> {
        kernel.fs().access(|fs| -> Result<FileDescriptor, KernelError> {
            let file = fs.open(path)?;
            self.install(file)
        })
    }

    /// Returns the size, in bytes, of the file open as `fd`.
    pub fn filesize(&mut self, kernel: &Kernel, fd: FileDescriptor) -> Result<usize, KernelError> {
        kernel
            .fs()
            .access(|_| -> Result<usize, KernelError> { Ok(self.get(fd)?.length()) })
    }

    /// Reads from `fd` into the user buffer.
    ///
    /// Reading the console blocks until the whole buffer has been filled.
    /// Reading a file stops at its end.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes read.
    /// - `Err(KernelError::BadFileDescriptor)`: `fd` is stdout or not open.
    pub fn read(
        &mut self,
        kernel: &Kernel,
        fd: FileDescriptor,
        buf: UserBufferMut,
    ) -> Result<usize, KernelError> {
        match fd {
            FileDescriptor::STDIN => {
                let console = kernel.console();
                let data: Vec<u8> = (0..buf.len()).map(|_| console.getc()).collect();
                Ok(buf.put(&data))
            }
            FileDescriptor::STDOUT => Err(KernelError::BadFileDescriptor),
            fd => {
                let mut data = vec![0; buf.len()];
                let read = kernel.fs().access(|_| -> Result<usize, KernelError> {
                    let file = self.get(fd)?;
                    if data.is_empty() {
                        return Ok(0);
                    }
                    file.read(&mut data)
                })?;
                Ok(buf.put(&data[..read.min(data.len())]))
            }
        }
    }

    /// Writes `data` to `fd`.
    ///
    /// Writing the console emits the whole buffer in one piece.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes written. A file that cannot grow
    ///   takes fewer bytes than given.
    /// - `Err(KernelError::BadFileDescriptor)`: `fd` is stdin or not open.
    pub fn write(
        &mut self,
        kernel: &Kernel,
        fd: FileDescriptor,
        data: &[u8],
    ) -> Result<usize, KernelError> {
        match fd {
            FileDescriptor::STDOUT => {
                if !data.is_empty() {
                    kernel.console().putbuf(data);
                }
                Ok(data.len())
            }
            FileDescriptor::STDIN => Err(KernelError::BadFileDescriptor),
            fd => kernel.fs().access(|_| -> Result<usize, KernelError> {
                let file = self.get(fd)?;
                if data.is_empty() {
                    return Ok(0);
                }
                file.write(data)
            }),
        }
    }

    /// Moves the position of `fd`. An unknown descriptor is ignored.
    pub fn seek(&mut self, kernel: &Kernel, fd: FileDescriptor, position: usize) {
        kernel.fs().access(|_| {
            if let Ok(file) = self.get(fd) {
                file.seek(position);
            }
        })
    }

    /// Returns the position of `fd`.
    pub fn tell(&mut self, kernel: &Kernel, fd: FileDescriptor) -> Result<usize, KernelError> {
        kernel
            .fs()
            .access(|_| -> Result<usize, KernelError> { Ok(self.get(fd)?.tell()) })
    }

    /// Closes `fd`, or every open file for [`FileDescriptor::CLOSE_ALL`].
    ///
    /// Closing a descriptor that is not open, including the console ones,
    /// does nothing.
    pub fn close(&mut self, kernel: &Kernel, fd: FileDescriptor) {
        if fd == FileDescriptor::CLOSE_ALL {
            return self.close_all(kernel);
        }
        kernel.fs().access(|_| drop(self.files.remove(&fd)))
    }

    /// Closes every open file.
    pub fn close_all(&mut self, kernel: &Kernel) {
        if self.files.is_empty() {
            return;
        }
        kernel
            .fs()
            .access(|_| drop(core::mem::take(&mut self.files)))
    }
}
