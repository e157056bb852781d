//! The process model.
//!
//! A [`Process`] is the kernel side of one running user program. It owns the
//! process's open files ([`FileStruct`]), the records of its children
//! ([`Children`]), and the link to the record its parent keeps for it
//! ([`ParentLink`]). The address space and the kernel services are shared.
//!
//! The handlers below take their arguments already decoded by
//! [`Syscall::decode`]. Pointer arguments are still unchecked user pointers;
//! each handler checks them against the address space of the process before
//! anything else happens.
//!
//! [`Syscall::decode`]: crate::syscall::Syscall::decode

use crate::{
    child::{Children, LoadOutcome, ParentLink, Pid},
    file_struct::{FileDescriptor, FileStruct},
    kernel::Kernel,
    uaccess::{UserCString, UserU8SliceRO, UserU8SliceWO},
};
use alloc::{format, string::String, sync::Arc};
use kbase::{KernelError, mm::AddressSpace, task::Disposition};

/// A user process.
pub struct Process {
    pid: Pid,
    name: String,
    kernel: Arc<Kernel>,
    aspace: Arc<dyn AddressSpace>,
    file_struct: FileStruct,
    children: Children,
    parent: Option<ParentLink>,
    exit_status: Option<i32>,
    halted: bool,
}

impl Process {
    /// Creates the process `pid` for `cmd_line`.
    ///
    /// `parent` is the link handed to the [`Launcher`], or `None` for the
    /// first process.
    ///
    /// [`Launcher`]: crate::kernel::Launcher
    pub fn new(
        kernel: Arc<Kernel>,
        pid: Pid,
        cmd_line: &str,
        aspace: Arc<dyn AddressSpace>,
        parent: Option<ParentLink>,
    ) -> Self {
        Self {
            pid,
            name: String::from(cmd_line.split_whitespace().next().unwrap_or("")),
            kernel,
            aspace,
            file_struct: FileStruct::new(),
            children: Children::new(),
            parent,
            exit_status: None,
            halted: false,
        }
    }

    /// The pid of the process.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The name of the program, the first word of its command line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The address space of the process.
    pub fn address_space(&self) -> &Arc<dyn AddressSpace> {
        &self.aspace
    }

    /// The open files of the process.
    pub fn file_struct(&self) -> &FileStruct {
        &self.file_struct
    }

    /// The children of the process that have not been reaped.
    pub fn children(&self) -> &Children {
        &self.children
    }

    /// The exit status, once the process has terminated.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// Returns true once the process has powered the machine off.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Shut down the machine.
    ///
    /// # Syscall API
    /// ```c
    /// void halt(void);
    /// ```
    ///
    /// Halting is not an exit: nothing is printed and no status reaches the
    /// parent, even if the power switch returns and the process is torn
    /// down afterwards.
    pub fn halt(&mut self) -> Disposition {
        log::info!("pid {}: halt", self.pid.0);
        self.halted = true;
        self.kernel.power().power_off();
        Disposition::Halt
    }

    /// Exit a process.
    ///
    /// # Syscall API
    /// ```c
    /// void exit(int status);
    /// ```
    /// - `status`: The exit code returned to a parent that `wait`s on it.
    ///
    /// # Behavior
    /// - Prints `<name>: exit(<status>)` on the console.
    /// - Hands `status` to the parent, if the parent still cares.
    /// - Closes every open file and forgets every child.
    /// - Wakes the parent, after everything above.
    ///
    /// Only the first call has an effect; later calls return the status of
    /// the first.
    pub fn exit(&mut self, status: i32) -> Disposition {
        if let Some(status) = self.exit_status {
            return Disposition::Exit(status);
        }
        self.exit_status = Some(status);
        self.kernel
            .console()
            .putbuf(format!("{}: exit({})\n", self.name, status).as_bytes());
        let notice = self
            .parent
            .take()
            .and_then(|parent| parent.report_exit(status));
        self.file_struct.close_all(&self.kernel);
        self.children.clear();
        if let Some(notice) = notice {
            notice.signal();
        }
        log::debug!("pid {}: exited with {}", self.pid.0, status);
        Disposition::Exit(status)
    }

    /// Terminates the process for `error` with status -1.
    pub fn kill(&mut self, error: KernelError) -> Disposition {
        log::warn!("pid {}: {}, terminating", self.pid.0, error);
        self.exit(-1)
    }

    /// Run a program as a child process.
    ///
    /// # Syscall API
    /// ```c
    /// pid_t exec(const char *cmd_line);
    /// ```
    /// - `cmd_line`: The program name followed by its arguments.
    ///
    /// # Returns
    /// - The pid of the child, once its program has been loaded.
    /// - [`KernelError::NoExec`] if the program could not be loaded.
    pub fn exec(&mut self, cmd_line: UserCString) -> Result<Pid, KernelError> {
        let cmd_line = cmd_line.read(self.aspace.as_ref())?;
        let pid = self.kernel.allocate_pid();
        let record = self.children.insert(pid);
        if let Err(e) = self
            .kernel
            .launcher()
            .launch(&self.kernel, pid, &cmd_line, ParentLink::new(&record))
        {
            self.children.remove(pid);
            return Err(e);
        }
        match record.wait_for_load() {
            LoadOutcome::Loaded => {
                log::info!("exec: pid {} loaded `{}`", pid.0, cmd_line);
                Ok(pid)
            }
            _ => {
                self.children.remove(pid);
                Err(KernelError::NoExec)
            }
        }
    }

    /// Wait for a child process to exit.
    ///
    /// # Syscall API
    /// ```c
    /// int wait(pid_t pid);
    /// ```
    /// - `pid`: A child started by `exec`.
    ///
    /// # Returns
    /// - The exit status of the child. A child that was killed reports -1.
    /// - [`KernelError::NoSuchChild`] at once if `pid` is not a child of this
    ///   process, or if it has already been waited for.
    pub fn wait(&mut self, pid: Pid) -> Result<i32, KernelError> {
        self.children.wait(pid)
    }

    /// Create a file.
    ///
    /// # Syscall API
    /// ```c
    /// bool create(const char *file, unsigned initial_size);
    /// ```
    pub fn create(&mut self, path: UserCString, initial_size: u32) -> Result<bool, KernelError> {
        let path = path.read(self.aspace.as_ref())?;
        Ok(self
            .file_struct
            .create(&self.kernel, &path, initial_size as usize))
    }

    /// Remove a file.
    ///
    /// # Syscall API
    /// ```c
    /// bool remove(const char *file);
    /// ```
    pub fn remove(&mut self, path: UserCString) -> Result<bool, KernelError> {
        let path = path.read(self.aspace.as_ref())?;
        Ok(self.file_struct.remove(&self.kernel, &path))
    }

    /// Open a file.
    ///
    /// # Syscall API
    /// ```c
    /// int open(const char *file);
    /// ```
    pub fn open(&mut self, path: UserCString) -> Result<FileDescriptor, KernelError> {
        let path = path.read(self.aspace.as_ref())?;
        self.file_struct.open(&self.kernel, &path)
    }

    /// Get the size of an open file.
    ///
    /// # Syscall API
    /// ```c
    /// int filesize(int fd);
    /// ```
    pub fn filesize(&mut self, fd: FileDescriptor) -> Result<usize, KernelError> {
        self.file_struct.filesize(&self.kernel, fd)
    }

    /// Read from a file or the console.
    ///
    /// # Syscall API
    /// ```c
    /// int read(int fd, void *buffer, unsigned size);
    /// ```
    pub fn read(&mut self, fd: FileDescriptor, buf: UserU8SliceWO) -> Result<usize, KernelError> {
        let buf = buf.validate(self.aspace.as_ref())?;
        self.file_struct.read(&self.kernel, fd, buf)
    }

    /// Write to a file or the console.
    ///
    /// # Syscall API
    /// ```c
    /// int write(int fd, const void *buffer, unsigned size);
    /// ```
    pub fn write(&mut self, fd: FileDescriptor, buf: UserU8SliceRO) -> Result<usize, KernelError> {
        let data = buf.get(self.aspace.as_ref())?;
        self.file_struct.write(&self.kernel, fd, &data)
    }

    /// Move the position of an open file.
    ///
    /// # Syscall API
    /// ```c
    /// void seek(int fd, unsigned position);
    /// ```
    pub fn seek(&mut self, fd: FileDescriptor, position: u32) {
        self.file_struct.seek(&self.kernel, fd, position as usize)
    }

    /// Get the position of an open file.
    ///
    /// # Syscall API
    /// ```c
    /// unsigned tell(int fd);
    /// ```
    pub fn tell(&mut self, fd: FileDescriptor) -> Result<usize, KernelError> {
        self.file_struct.tell(&self.kernel, fd)
    }

    /// Close an open file. `-1` closes every open file.
    ///
    /// # Syscall API
    /// ```c
    /// void close(int fd);
    /// ```
    pub fn close(&mut self, fd: FileDescriptor) {
        self.file_struct.close(&self.kernel, fd)
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // A process torn down without exiting still releases its files and
        // wakes its parent.
        if self.exit_status.is_none() && !self.halted {
            self.exit(-1);
        }
    }
}
