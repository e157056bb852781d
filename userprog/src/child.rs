//! # Parent and child processes.
//!
//! A process learns about its children only through `exec` and `wait`.
//! `exec` returns once the child has either loaded its program or failed to.
//! `wait` blocks until the child has exited and returns its exit status,
//! once.
//!
//! For each child, the parent keeps a [`ChildRecord`] in its [`Children`]
//! registry. The record is the only state shared between the two processes:
//!
//! ```text
//!      parent                                   child
//!  +------------+      Arc       +-------------+      Weak      +------------+
//!  |  Children  | -------------> | ChildRecord | <------------- | ParentLink |
//!  +------------+                +-------------+                +------------+
//! ```
//!
//! The parent owns the record; the child holds a [`ParentLink`], which can
//! not keep the record alive. When the parent exits or reaps the child, the
//! record goes away, and whatever the child reports afterwards is discarded.
//!
//! The child reports into the record exactly twice:
//! 1. the outcome of loading its program ([`ParentLink::report_load`]),
//! 2. its exit status, when it terminates.
//!
//! Each report is followed by a signal on a zero-permit [`Semaphore`], which
//! the parent waits on.

use alloc::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};
use kbase::{
    KernelError,
    sync::{Semaphore, SpinLock},
};

/// A process identifier.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Pid(pub i32);

/// Whether a child has loaded its program.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoadOutcome {
    /// The child has not reported yet.
    NotLoaded,
    /// The program was loaded and is running.
    Loaded,
    /// The program could not be loaded; the child never ran.
    LoadFailed,
}

/// What a parent knows about one of its children.
pub struct ChildRecord {
    pid: Pid,
    load: SpinLock<LoadOutcome>,
    loaded: Semaphore<()>,
    exit_status: SpinLock<Option<i32>>,
    exited: Semaphore<()>,
}

impl ChildRecord {
    fn new(pid: Pid) -> Self {
        Self {
            pid,
            load: SpinLock::new(LoadOutcome::NotLoaded),
            loaded: Semaphore::new(0, ()),
            exit_status: SpinLock::new(None),
            exited: Semaphore::new(0, ()),
        }
    }

    /// The pid of the child.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The load outcome reported so far.
    pub fn load_outcome(&self) -> LoadOutcome {
        *self.load.lock()
    }

    /// Blocks until the child has reported its load outcome.
    pub fn wait_for_load(&self) -> LoadOutcome {
        match self.load_outcome() {
            LoadOutcome::NotLoaded => {
                drop(self.loaded.wait());
                self.load_outcome()
            }
            outcome => outcome,
        }
    }

    /// Blocks until the child has exited, and returns its status.
    pub fn wait_for_exit(&self) -> i32 {
        drop(self.exited.wait());
        // The status is stored before the signal; a child that exits without
        // one was killed.
        self.exit_status.lock().unwrap_or(-1)
    }

    fn set_load(&self, loaded: bool) -> bool {
        let mut load = self.load.lock();
        if *load != LoadOutcome::NotLoaded {
            return false;
        }
        *load = if loaded {
            LoadOutcome::Loaded
        } else {
            LoadOutcome::LoadFailed
        };
        drop(load);
        self.loaded.signal();
        true
    }
}

/// The children of a process, by pid.
///
/// Holds the record of every child that has been started and not yet
/// reaped.
#[derive(Default)]
pub struct Children {
    records: BTreeMap<Pid, Arc<ChildRecord>>,
}

impl Children {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the record for a child about to be started.
    pub fn insert(&mut self, pid: Pid) -> Arc<ChildRecord> {
        let record = Arc::new(ChildRecord::new(pid));
        self.records.insert(pid, record.clone());
        record
    }

    /// Looks up the record of `pid`.
    pub fn get(&self, pid: Pid) -> Option<&Arc<ChildRecord>> {
        self.records.get(&pid)
    }

    /// Forgets `pid`.
    pub fn remove(&mut self, pid: Pid) -> Option<Arc<ChildRecord>> {
        self.records.remove(&pid)
    }

    /// Returns true if `pid` is a child that has not been reaped.
    pub fn contains(&self, pid: Pid) -> bool {
        self.records.contains_key(&pid)
    }

    /// Number of children not yet reaped.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there is no child to reap.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Waits for `pid` to exit and reaps it.
    ///
    /// # Errors
    /// - [`KernelError::NoSuchChild`], without blocking, if `pid` is not a
    ///   child of this process or has already been reaped.
    pub fn wait(&mut self, pid: Pid) -> Result<i32, KernelError> {
        let record = self.get(pid).cloned().ok_or(KernelError::NoSuchChild)?;
        let status = record.wait_for_exit();
        self.records.remove(&pid);
        Ok(status)
    }

    /// Forgets every child, orphaning the ones still running.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// The link from a child process to the record its parent keeps for it.
///
/// The link does not keep the record alive. Reports made after the parent has
/// dropped the record are discarded.
///
/// A link dropped before its load outcome is reported counts as a failed load,
/// and one dropped after a successful load without an exit report counts as
/// an exit with status -1. Either way the parent is never left waiting.
pub struct ParentLink {
    record: Weak<ChildRecord>,
}

impl ParentLink {
    /// Links to `record`.
    pub fn new(record: &Arc<ChildRecord>) -> Self {
        Self {
            record: Arc::downgrade(record),
        }
    }

    /// The pid of the child, while the parent still holds its record.
    pub fn pid(&self) -> Option<Pid> {
        self.record.upgrade().map(|record| record.pid())
    }

    /// Returns true if the parent still holds the record.
    pub fn is_attached(&self) -> bool {
        self.record.strong_count() > 0
    }

    /// Reports whether the program has been loaded, waking the parent.
    ///
    /// Only the first report counts. Returns whether this report reached
    /// the parent.
    pub fn report_load(&self, loaded: bool) -> bool {
        self.record
            .upgrade()
            .is_some_and(|record| record.set_load(loaded))
    }

    /// Stores the exit status, then returns the record so that the caller
    /// can signal the exit once the process has released its resources.
    pub(crate) fn report_exit(self, status: i32) -> Option<ExitNotice> {
        let record = self.record.upgrade()?;
        *record.exit_status.lock() = Some(status);
        Some(ExitNotice { record })
    }
}

impl Drop for ParentLink {
    fn drop(&mut self) {
        if let Some(record) = self.record.upgrade() {
            if !record.set_load(false) && record.exit_status.lock().is_none() {
                record.exited.signal();
            }
        }
    }
}

/// The pending exit signal of a terminating child.
///
/// Keeps the record alive until the signal is sent.
pub(crate) struct ExitNotice {
    record: Arc<ChildRecord>,
}

impl ExitNotice {
    /// Wakes the parent waiting on the child.
    pub(crate) fn signal(self) {
        self.record.exited.signal();
    }
}
