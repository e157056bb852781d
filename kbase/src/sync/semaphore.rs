//! # Semaphore.
//!
//! A semaphore maintains an internal count of available "permits". A thread
//! acquires a permit by calling [`Semaphore::wait`], and releases it either
//! explicitly via [`Semaphore::signal`] or implicitly when the
//! [`SemaphorePermits`] guard is dropped.
//!
//! A semaphore initialized with zero permits serves as an **event signal**:
//! the waiting thread blocks until another thread calls
//! [`Semaphore::signal`] once. Because the waiter hands its permit back when
//! the guard drops, the event stays signaled afterwards, and every later
//! [`Semaphore::wait`] returns immediately.
//!
//! #### Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use kbase::sync::Semaphore;
//!
//! let loaded = Arc::new(Semaphore::new(0, ()));
//! let child = {
//!     let loaded = loaded.clone();
//!     std::thread::spawn(move || loaded.signal())
//! };
//! drop(loaded.wait()); // Blocks until the child signals.
//! child.join().unwrap();
//! ```

use super::SpinLock;
use core::ops::Deref;
use crossbeam_utils::Backoff;

/// Counting semaphore.
///
/// A semaphore maintains a set of permits and resource. Permits are used to
/// synchronize access to a shared resource.
pub struct Semaphore<T> {
    permits: SpinLock<usize>,
    resource: T,
}

impl<T> Semaphore<T> {
    /// Creates a new semaphore initialized with a specified number of permits.
    ///
    /// # Arguments
    ///
    /// * `permits` - The initial number of available permits.
    /// * `resource` - A resource combined with this semaphore.
    pub const fn new(permits: usize, resource: T) -> Self {
        Self {
            permits: SpinLock::new(permits),
            resource,
        }
    }

    /// Waits until a permit becomes available and then acquires it.
    ///
    /// If no permits are available, this function will block the current
    /// thread until another thread calls `signal()` to release a permit.
    pub fn wait(&self) -> SemaphorePermits<'_, T> {
        let backoff = Backoff::new();
        loop {
            if let Some(permit) = self.try_wait() {
                return permit;
            }
            backoff.snooze();
        }
    }

    /// Acquires a permit if one is available, without blocking.
    pub fn try_wait(&self) -> Option<SemaphorePermits<'_, T>> {
        let mut permits = self.permits.lock();
        if *permits > 0 {
            *permits -= 1;
            Some(SemaphorePermits { sema: self })
        } else {
            None
        }
    }

    /// Releases a permit back to the semaphore.
    ///
    /// Normally, you don't call this directly except for signaling an event
    /// with a zero-initialized semaphore. Instead, it's automatically invoked
    /// when a [`SemaphorePermits`] guard is dropped.
    pub fn signal(&self) {
        *self.permits.lock() += 1;
    }
}

/// An RAII implementation of a "scoped semaphore". When this structure
/// is dropped (falls out of scope), the semaphore will be signaled.
///
/// The data protected by the semaphore can be accessed through this guard via
/// its [`Deref`] implementations.
///
/// This structure is created by the [`wait`] method on [`Semaphore`].
///
/// [`wait`]: Semaphore::wait
pub struct SemaphorePermits<'a, T> {
    sema: &'a Semaphore<T>,
}

impl<T> Deref for SemaphorePermits<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.sema.resource
    }
}

impl<T> Drop for SemaphorePermits<'_, T> {
    fn drop(&mut self) {
        self.sema.signal()
    }
}
