//! Kernel backend for the `log` facade.
//!
//! Kernel code logs through the `log` macros (`log::info!`, `log::warn!`,
//! ...). Once [`init`] has registered a console, every enabled record is
//! written to it as a single line tagged with its level:
//!
//! ```text
//! [INFO] exec: pid 3 loaded `child-simple`
//! [WARN] pid 2: bad user address, terminating
//! ```
//!
//! The maximum level is chosen at build time by the `LOG` environment
//! variable (`ERROR`, `WARN`, `INFO`, `DEBUG` or `TRACE`); logging is off
//! otherwise.

use crate::{sync::SpinLock, teletype::Teletype};
use alloc::{format, sync::Arc};
use core::sync::atomic::{AtomicBool, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

static SINK: SpinLock<Option<Arc<dyn Teletype>>> = SpinLock::new(None);

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

static INSTALLED: AtomicBool = AtomicBool::new(false);

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}\n", record.level(), record.args());
        if let Some(sink) = SINK.lock().as_ref() {
            sink.putbuf(line.as_bytes());
        }
    }

    fn flush(&self) {}
}

/// The level requested by the `LOG` build-time environment variable.
pub fn level_from_env() -> LevelFilter {
    match option_env!("LOG") {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Routes log records of at most `level` to `sink`.
///
/// The logger is installed on the first call; later calls only replace the
/// sink and the level.
pub fn init(sink: Arc<dyn Teletype>, level: LevelFilter) -> Result<(), SetLoggerError> {
    *SINK.lock() = Some(sink);
    if !INSTALLED.swap(true, Ordering::SeqCst) {
        if let Err(e) = log::set_logger(&LOGGER) {
            INSTALLED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    }
    log::set_max_level(level);
    Ok(())
}
