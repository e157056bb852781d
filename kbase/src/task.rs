//! Task trait for interact with user process.

use crate::interrupt::Registers;

/// What the trap plumbing must do once a system call has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to the user program with the updated registers.
    Resume,
    /// The process has terminated with the given exit status; its thread
    /// must not return to user mode.
    Exit(i32),
    /// The machine has been asked to power off.
    Halt,
}

/// Represents a **task** executed by a thread.
///
/// This trait defines the functionality required for handling events
/// triggered by a user process.
pub trait Task {
    /// Handles a **system call** triggered by the user program.
    ///
    /// - The `registers` parameter contains the state of the CPU registers at
    ///   the time of the system call.
    /// - Implementations of this function should parse the system call
    ///   arguments, execute the corresponding operation, and store the result
    ///   back in `registers`.
    fn syscall(&mut self, registers: &mut Registers) -> Disposition;

    /// Handles a fault raised by the user program itself (for example, a
    /// page fault on an unmapped user address), which terminates it.
    fn user_fault(&mut self) -> Disposition;
}
