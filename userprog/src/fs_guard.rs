//! Serialized access to the filesystem.
//!
//! The filesystem is not safe to enter from two threads at once. [`FsGuard`]
//! owns the only handle to it behind a [`SpinLock`], and hands it out solely
//! for the duration of a closure. The lock is released when the closure
//! returns, whether it succeeds, fails, or returns early.
//!
//! Open file handles share state with the filesystem, so calls through them
//! (and dropping them, which closes the file) happen inside
//! [`FsGuard::access`] as well.

use alloc::boxed::Box;
use kbase::{fs::FileSystem, sync::SpinLock};

/// The filesystem of a kernel, behind its lock.
pub struct FsGuard {
    fs: SpinLock<Box<dyn FileSystem>>,
}

impl FsGuard {
    /// Takes ownership of the filesystem.
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self {
            fs: SpinLock::new(fs),
        }
    }

    /// Runs `f` with exclusive access to the filesystem.
    ///
    /// Waits while another thread is inside the filesystem. `f` must not call
    /// [`FsGuard::access`] again.
    pub fn access<R>(&self, f: impl FnOnce(&mut dyn FileSystem) -> R) -> R {
        let mut fs = self.fs.lock();
        f(&mut **fs)
    }

    /// Returns true if some thread is inside the filesystem.
    pub fn is_busy(&self) -> bool {
        self.fs.is_locked()
    }
}
