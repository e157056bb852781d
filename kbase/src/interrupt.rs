//! Trap frame of a user program.

/// The register state of a user program captured by the interrupt entry
/// when the program executes the system call trap.
///
/// The system call layer only ever looks at two of the saved registers:
/// the user stack pointer, under which the program has pushed the system
/// call number and its arguments, and the accumulator, which carries the
/// return value back to the program when the trap returns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// The user stack pointer at the time of the trap.
    pub esp: usize,
    /// The return value register.
    pub eax: u32,
}

impl Registers {
    /// Creates a trap frame whose stack pointer is `esp`.
    pub const fn with_stack(esp: usize) -> Self {
        Self { esp, eax: 0 }
    }
}
