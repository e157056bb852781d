//! A teletype (TTY) interface for character-based I/O.
//!
//! This module provides a trait [`Teletype`] that defines the interface of
//! the console: a keyboard-like input device delivering one byte at a time,
//! and a display-like output device accepting whole buffers.
//!
//! Input devices produce bytes from interrupt context while kernel threads
//! consume them. [`InputBuffer`] is the bounded queue between the two.

use alloc::vec::Vec;
use crossbeam_queue::ArrayQueue;
use crossbeam_utils::Backoff;

/// The `Teletype` trait represents the console device.
pub trait Teletype: Send + Sync {
    /// Retrieves a single byte from the input device.
    ///
    /// Blocks until a byte is available.
    fn getc(&self) -> u8;

    /// Writes the whole buffer to the output device at once.
    ///
    /// Output of concurrent writers is not interleaved within one call.
    fn putbuf(&self, data: &[u8]);
}

/// A bounded buffer of input bytes.
///
/// The producer side ([`InputBuffer::push`]) never blocks: when the buffer is
/// full the byte is dropped, as a keyboard controller drops keystrokes nobody
/// reads. The consumer side ([`InputBuffer::getc`]) waits until a byte
/// arrives.
pub struct InputBuffer {
    queue: ArrayQueue<u8>,
}

impl InputBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    /// Appends a byte, returning false if the buffer was full.
    pub fn push(&self, b: u8) -> bool {
        self.queue.push(b).is_ok()
    }

    /// Appends every byte of `data` that fits.
    pub fn extend(&self, data: &[u8]) -> usize {
        data.iter().take_while(|b| self.push(**b)).count()
    }

    /// Removes the oldest byte without blocking.
    pub fn try_getc(&self) -> Option<u8> {
        self.queue.pop()
    }

    /// Removes the oldest byte, waiting until one is available.
    pub fn getc(&self) -> u8 {
        let backoff = Backoff::new();
        loop {
            if let Some(b) = self.queue.pop() {
                return b;
            }
            backoff.snooze();
        }
    }

    /// Removes every byte currently buffered.
    pub fn drain(&self) -> Vec<u8> {
        core::iter::from_fn(|| self.queue.pop()).collect()
    }

    /// Returns true if no byte is buffered.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
