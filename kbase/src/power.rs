//! Modules for system power operations.

/// Machine power control.
pub trait PowerControl: Send + Sync {
    /// Shutdown the machine.
    ///
    /// On real hardware this never returns. Implementations that cannot
    /// power off (for example, an emulated machine under test) return, and
    /// the caller then stops the current thread.
    fn power_off(&self);
}
