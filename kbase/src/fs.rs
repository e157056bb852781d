//! Filesystem abstraction.
//!
//! The system call layer consumes an existing filesystem through the
//! primitives below. Implementations may block on device I/O and are **not**
//! required to be thread-safe: the caller serializes every call, including
//! the ones made through an open [`RegularFile`] handle.
//!
//! Closing a file is dropping its handle.

use crate::KernelError;
use alloc::boxed::Box;

/// Trait representing a filesystem.
pub trait FileSystem
where
    Self: Send,
{
    /// Creates a regular file named `path` with `initial_size` zero bytes.
    ///
    /// # Returns
    /// - `Ok(())`: The file was created.
    /// - `Err(KernelError::FileExist)`: A file with the same name exists.
    /// - `Err(Error)`: Any other failure of the underlying filesystem.
    fn create(&mut self, path: &str, initial_size: usize) -> Result<(), KernelError>;

    /// Removes the file named `path`.
    ///
    /// Handles that are already open on the file keep working until they are
    /// closed.
    fn remove(&mut self, path: &str) -> Result<(), KernelError>;

    /// Opens the file named `path`.
    ///
    /// Every call returns an independent handle with its own position,
    /// starting at 0.
    fn open(&mut self, path: &str) -> Result<Box<dyn RegularFile>, KernelError>;
}

/// Trait representing an open regular file.
///
/// A regular file is a sequence of bytes with a current position. Reads and
/// writes start at the current position and advance it by the number of
/// bytes transferred.
pub trait RegularFile
where
    Self: Send,
{
    /// Returns the size of the file in bytes.
    fn length(&self) -> usize;

    /// Reads up to `buf.len()` bytes at the current position.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes read, which is smaller than
    ///   `buf.len()` at the end of the file.
    /// - `Err(KernelError)`: An error occured while the read operation.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError>;

    /// Writes `buf` at the current position.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes written, which may be smaller than
    ///   `buf.len()` if the file cannot grow.
    /// - `Err(KernelError)`: An error occured while the write operation.
    fn write(&mut self, buf: &[u8]) -> Result<usize, KernelError>;

    /// Moves the current position to `position` bytes from the start.
    ///
    /// Seeking past the end of the file is allowed.
    fn seek(&mut self, position: usize);

    /// Returns the current position.
    fn tell(&self) -> usize;
}
