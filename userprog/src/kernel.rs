//! Kernel-wide state shared by every process.
//!
//! A [`Kernel`] bundles the devices and services the system call layer
//! consumes:
//!
//! - the filesystem, behind its [`FsGuard`],
//! - the console ([`Teletype`]),
//! - the power switch ([`PowerControl`]),
//! - the [`Launcher`] that starts new processes.
//!
//! It is configured once with a [`KernelBuilder`] and shared as an
//! `Arc<Kernel>` by every [`Process`].
//!
//! ```ignore
//! let kernel = KernelBuilder::new()
//!     .filesystem(Box::new(fs))
//!     .console(console)
//!     .power(power)
//!     .launcher(launcher)
//!     .logging(kbase::logging::level_from_env())
//!     .build()?;
//! ```
//!
//! [`Process`]: crate::Process

use crate::{
    child::{ParentLink, Pid},
    fs_guard::FsGuard,
};
use alloc::{boxed::Box, sync::Arc};
use core::sync::atomic::{AtomicI32, Ordering};
use kbase::{KernelError, fs::FileSystem, power::PowerControl, teletype::Teletype};
use log::LevelFilter;

/// Starts new processes.
///
/// The loader and the scheduler live behind this trait. The system call layer
/// only tells it which program to run and under which pid.
pub trait Launcher
where
    Self: Send + Sync,
{
    /// Starts process `pid` running `cmd_line` on a thread of its own.
    ///
    /// The program to run is the first whitespace-separated word of
    /// `cmd_line`. Once the new thread has tried to load it, it must report
    /// the outcome through [`ParentLink::report_load`]; on success it then
    /// runs the program as a [`Process`] created with `Some(parent)`.
    /// Dropping `parent` without a report counts as a failed load.
    ///
    /// Returns an error, without starting anything, if no thread can be
    /// created.
    ///
    /// [`Process`]: crate::Process
    fn launch(
        &self,
        kernel: &Arc<Kernel>,
        pid: Pid,
        cmd_line: &str,
        parent: ParentLink,
    ) -> Result<(), KernelError>;
}

/// The kernel state shared by all processes.
pub struct Kernel {
    fs: FsGuard,
    console: Arc<dyn Teletype>,
    power: Arc<dyn PowerControl>,
    launcher: Box<dyn Launcher>,
    next_pid: AtomicI32,
}

impl Kernel {
    /// The filesystem.
    pub fn fs(&self) -> &FsGuard {
        &self.fs
    }

    /// The console.
    pub fn console(&self) -> &Arc<dyn Teletype> {
        &self.console
    }

    /// The power switch.
    pub fn power(&self) -> &dyn PowerControl {
        self.power.as_ref()
    }

    /// The process launcher.
    pub fn launcher(&self) -> &dyn Launcher {
        self.launcher.as_ref()
    }

    /// Hands out a fresh pid. Pids start at 1 and are never reused.
    pub fn allocate_pid(&self) -> Pid {
        Pid(self.next_pid.fetch_add(1, Ordering::Relaxed))
    }
}

/// Configures a [`Kernel`].
///
/// Every collaborator must be provided before [`KernelBuilder::build`].
#[derive(Default)]
pub struct KernelBuilder {
    fs: Option<Box<dyn FileSystem>>,
    console: Option<Arc<dyn Teletype>>,
    power: Option<Arc<dyn PowerControl>>,
    launcher: Option<Box<dyn Launcher>>,
    log_level: Option<LevelFilter>,
}

impl KernelBuilder {
    /// Starts an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filesystem.
    pub fn filesystem(mut self, fs: Box<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Sets the console.
    pub fn console(mut self, console: Arc<dyn Teletype>) -> Self {
        self.console = Some(console);
        self
    }

    /// Sets the power switch.
    pub fn power(mut self, power: Arc<dyn PowerControl>) -> Self {
        self.power = Some(power);
        self
    }

    /// Sets the process launcher.
    pub fn launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Sends kernel log records of at most `level` to the console.
    ///
    /// Without this, the kernel does not touch the logger.
    pub fn logging(mut self, level: LevelFilter) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Builds the kernel.
    ///
    /// # Errors
    /// - [`KernelError::InvalidArgument`] if a collaborator is missing.
    /// - [`KernelError::OperationNotPermitted`] if logging was asked for but
    ///   another logger is already in place.
    pub fn build(self) -> Result<Arc<Kernel>, KernelError> {
        let (Some(fs), Some(console), Some(power), Some(launcher)) =
            (self.fs, self.console, self.power, self.launcher)
        else {
            log::error!("kernel: incomplete configuration");
            return Err(KernelError::InvalidArgument);
        };
        if let Some(level) = self.log_level {
            kbase::logging::init(console.clone(), level)
                .map_err(|_| KernelError::OperationNotPermitted)?;
        }
        Ok(Arc::new(Kernel {
            fs: FsGuard::new(fs),
            console,
            power,
            launcher,
            next_pid: AtomicI32::new(1),
        }))
    }
}
