//! # Synchronization Primitives.
//!
//! | Primitive     | Blocks Thread? | Typical Use Case                                  |
//! |---------------|----------------|---------------------------------------------------|
//! | [`SpinLock`]  | No (busy wait) | Exclusive access to shared data                   |
//! | [`Semaphore`] | Yes            | One-shot events between threads, bounded access   |
//!
//! Waiting threads back off with [`crossbeam_utils::Backoff`], which yields
//! the processor once spinning stops paying off.

pub mod semaphore;
pub mod spinlock;

pub use semaphore::{Semaphore, SemaphorePermits};
pub use spinlock::{SpinLock, SpinLockGuard, WouldBlock};
