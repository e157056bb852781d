//! A machine for running user programs on the host.
//!
//! Every collaborator the system call layer consumes is faked here: the
//! filesystem keeps files in memory, user memory is a set of heap pages,
//! the console is a scripted input queue and an output log, and the launcher
//! runs each child program on a thread of its own.
#![allow(dead_code)]

use kbase::{
    KernelError,
    addressing::{Kva, PAGE_SIZE, PHYS_BASE, USER_BASE, Va},
    fs::{FileSystem, RegularFile},
    interrupt::Registers,
    mm::{AddressSpace, Mapping, PteFlags},
    power::PowerControl,
    task::{Disposition, Task},
    teletype::{InputBuffer, Teletype},
};
use std::{
    collections::BTreeMap,
    time::Duration,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use userprog::{Kernel, KernelBuilder, Launcher, ParentLink, Pid, Process};

/// Traps into `$process` with the system call `$nr` and its arguments, and
/// evaluates to the value left in `eax`.
macro_rules! syscall {
    ($process:expr, $mem:expr, $nr:expr $(, $arg:expr)* $(,)?) => {
        common::trap(&mut $process, &$mem, &[$nr as u32 $(, $arg as u32)*]).1
    };
}

/// Where the stack pointer sits when a program traps.
pub const STACK_TOP: usize = PHYS_BASE - 0x100;

/// Pushes `words` at [`STACK_TOP`] and traps.
pub fn trap(process: &mut Process, mem: &UserMemory, words: &[u32]) -> (Disposition, i32) {
    trap_at(process, mem, STACK_TOP, words)
}

/// Pushes `words` at `esp` and traps.
pub fn trap_at(
    process: &mut Process,
    mem: &UserMemory,
    esp: usize,
    words: &[u32],
) -> (Disposition, i32) {
    for (i, word) in words.iter().enumerate() {
        mem.poke(esp + 4 * i, &word.to_le_bytes());
    }
    let mut regs = Registers::with_stack(esp);
    let disposition = process.syscall(&mut regs);
    (disposition, regs.eax as i32)
}

#[repr(align(4096))]
struct Page([u8; PAGE_SIZE]);

/// The memory of one user program.
///
/// The stack page right below `PHYS_BASE` is always mapped. Data is handed
/// out upward from `USER_BASE`.
pub struct UserMemory {
    pages: Mutex<BTreeMap<usize, (usize, bool)>>,
    brk: AtomicUsize,
    ro_brk: AtomicUsize,
}

impl UserMemory {
    /// Where read-only pages are placed.
    pub const RO_BASE: usize = 0x1000_0000;

    pub fn new() -> Arc<Self> {
        let mem = Self {
            pages: Mutex::new(BTreeMap::new()),
            brk: AtomicUsize::new(USER_BASE),
            ro_brk: AtomicUsize::new(Self::RO_BASE),
        };
        mem.map(PHYS_BASE - PAGE_SIZE, true);
        Arc::new(mem)
    }

    /// Maps the page containing `va`, if it is not mapped yet.
    pub fn map(&self, va: usize, writable: bool) {
        let va = Va::new(va).page_down().into_usize();
        self.pages.lock().unwrap().entry(va).or_insert_with(|| {
            let page = Box::into_raw(Box::new(Page([0; PAGE_SIZE])));
            (page as usize, writable)
        });
    }

    /// Writes `data` at `va`, regardless of page permissions.
    pub fn poke(&self, va: usize, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            let mapping = self.translate(Va::new(va + i)).expect("poke unmapped");
            mapping.kva.write_bytes(&[*b]);
        }
    }

    /// Reads `len` bytes at `va`.
    pub fn peek(&self, va: usize, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                self.translate(Va::new(va + i))
                    .expect("peek unmapped")
                    .kva
                    .read_u8()
            })
            .collect()
    }

    /// Reserves `len` writable bytes.
    pub fn alloc(&self, len: usize) -> usize {
        let addr = self.brk.fetch_add(len.max(1), Ordering::SeqCst);
        let mut page = Va::new(addr).page_down().into_usize();
        while page < addr + len.max(1) {
            self.map(page, true);
            page += PAGE_SIZE;
        }
        addr
    }

    /// Places a NUL-terminated copy of `s`.
    pub fn string(&self, s: &str) -> usize {
        let addr = self.alloc(s.len() + 1);
        self.poke(addr, s.as_bytes());
        self.poke(addr + s.len(), &[0]);
        addr
    }

    /// Places `data` on a page of its own that the program cannot write.
    pub fn read_only(&self, data: &[u8]) -> usize {
        assert!(data.len() <= PAGE_SIZE);
        let addr = self.ro_brk.fetch_add(PAGE_SIZE, Ordering::SeqCst);
        self.map(addr, false);
        self.poke(addr, data);
        addr
    }
}

impl AddressSpace for UserMemory {
    fn translate(&self, va: Va) -> Option<Mapping> {
        let pages = self.pages.lock().unwrap();
        let &(page, writable) = pages.get(&va.page_down().into_usize())?;
        let mut flags = PteFlags::P | PteFlags::US;
        if writable {
            flags |= PteFlags::RW;
        }
        Some(Mapping {
            kva: unsafe { Kva::new(page + va.page_offset()) },
            flags,
        })
    }
}

impl Drop for UserMemory {
    fn drop(&mut self) {
        for (_, (page, _)) in std::mem::take(self.pages.get_mut().unwrap()) {
            drop(unsafe { Box::from_raw(page as *mut Page) });
        }
    }
}

/// What the filesystem has seen.
#[derive(Default)]
pub struct FsStats {
    files: Mutex<BTreeMap<String, Arc<Mutex<Vec<u8>>>>>,
    calls: AtomicUsize,
    inside: AtomicUsize,
    overlaps: AtomicUsize,
    open_handles: AtomicUsize,
}

impl FsStats {
    /// Calls made into the filesystem or one of its files.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that started while another call was running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Files opened and not closed yet.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Puts a file in place, bypassing the system call layer.
    pub fn put(&self, name: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Mutex::new(data.to_vec())));
    }

    /// The contents of a file, if it exists.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files.get(name).map(|data| data.lock().unwrap().clone())
    }

    fn enter(&self) -> Inside<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.inside.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::yield_now();
        Inside(self)
    }
}

struct Inside<'a>(&'a FsStats);

impl Drop for Inside<'_> {
    fn drop(&mut self) {
        self.0.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-memory filesystem of fixed-size files.
pub struct MemFs(Arc<FsStats>);

impl FileSystem for MemFs {
    fn create(&mut self, path: &str, initial_size: usize) -> Result<(), KernelError> {
        let _inside = self.0.enter();
        if path.is_empty() {
            return Err(KernelError::NoSuchEntry);
        }
        let mut files = self.0.files.lock().unwrap();
        if files.contains_key(path) {
            return Err(KernelError::FileExist);
        }
        files.insert(
            path.to_string(),
            Arc::new(Mutex::new(vec![0; initial_size])),
        );
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), KernelError> {
        let _inside = self.0.enter();
        self.0
            .files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or(KernelError::NoSuchEntry)
    }

    fn open(&mut self, path: &str) -> Result<Box<dyn RegularFile>, KernelError> {
        let _inside = self.0.enter();
        let data = self
            .0
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(KernelError::NoSuchEntry)?;
        self.0.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemFile {
            stats: self.0.clone(),
            data,
            position: 0,
        }))
    }
}

struct MemFile {
    stats: Arc<FsStats>,
    data: Arc<Mutex<Vec<u8>>>,
    position: usize,
}

impl RegularFile for MemFile {
    fn length(&self) -> usize {
        let _inside = self.stats.enter();
        self.data.lock().unwrap().len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, KernelError> {
        let _inside = self.stats.enter();
        let data = self.data.lock().unwrap();
        let start = self.position.min(data.len());
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        self.position += len;
        Ok(len)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, KernelError> {
        let _inside = self.stats.enter();
        let mut data = self.data.lock().unwrap();
        let start = self.position.min(data.len());
        let len = buf.len().min(data.len() - start);
        data[start..start + len].copy_from_slice(&buf[..len]);
        self.position += len;
        Ok(len)
    }

    fn seek(&mut self, position: usize) {
        let _inside = self.stats.enter();
        self.position = position;
    }

    fn tell(&self) -> usize {
        let _inside = self.stats.enter();
        self.position
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        let _inside = self.stats.enter();
        self.stats.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A console with scripted input.
pub struct Console {
    input: InputBuffer,
    output: Mutex<Vec<u8>>,
    putbufs: AtomicUsize,
}

impl Console {
    fn new() -> Self {
        Self {
            input: InputBuffer::new(1024),
            output: Mutex::new(Vec::new()),
            putbufs: AtomicUsize::new(0),
        }
    }

    /// Queues keystrokes.
    pub fn type_in(&self, data: &[u8]) {
        assert_eq!(self.input.extend(data), data.len());
    }

    /// Everything written so far.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }

    /// Number of writes to the output device.
    pub fn putbufs(&self) -> usize {
        self.putbufs.load(Ordering::SeqCst)
    }
}

impl Teletype for Console {
    fn getc(&self) -> u8 {
        self.input.getc()
    }

    fn putbuf(&self, data: &[u8]) {
        self.output.lock().unwrap().extend_from_slice(data);
        self.putbufs.fetch_add(1, Ordering::SeqCst);
    }
}

/// Remembers whether the machine was powered off.
#[derive(Default)]
pub struct PowerSwitch(AtomicBool);

impl PowerSwitch {
    pub fn is_off(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl PowerControl for PowerSwitch {
    fn power_off(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// The body of a program: it runs with its own process and memory.
pub type Program = Arc<dyn Fn(&mut Process, &UserMemory) + Send + Sync>;

/// Programs the launcher can load, by name.
#[derive(Default, Clone)]
pub struct Programs(BTreeMap<String, Program>);

impl Programs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        name: &str,
        body: impl Fn(&mut Process, &UserMemory) + Send + Sync + 'static,
    ) -> Self {
        self.0.insert(name.to_string(), Arc::new(body));
        self
    }
}

/// Runs every process on a thread of its own.
///
/// A program missing from the table fails to load. Each child takes
/// `load_delay` to report whether it loaded.
struct ThreadLauncher {
    programs: Programs,
    load_delay: Duration,
}

impl Launcher for ThreadLauncher {
    fn launch(
        &self,
        kernel: &Arc<Kernel>,
        pid: Pid,
        cmd_line: &str,
        parent: ParentLink,
    ) -> Result<(), KernelError> {
        let name = cmd_line.split_whitespace().next().unwrap_or("");
        let program = self.programs.0.get(name).cloned();
        let (kernel, cmd_line) = (kernel.clone(), cmd_line.to_string());
        let load_delay = self.load_delay;
        std::thread::Builder::new()
            .name(format!("pid {}", pid.0))
            .spawn(move || {
                std::thread::sleep(load_delay);
                let Some(program) = program else {
                    parent.report_load(false);
                    return;
                };
                let mem = UserMemory::new();
                parent.report_load(true);
                let mut process = Process::new(kernel, pid, &cmd_line, mem.clone(), Some(parent));
                program(&mut process, &mem);
            })
            .map(|_| ())
            .map_err(|_| KernelError::NoMemory)
    }
}

/// A kernel with fake devices.
pub struct Machine {
    pub kernel: Arc<Kernel>,
    pub fs: Arc<FsStats>,
    pub console: Arc<Console>,
    pub power: Arc<PowerSwitch>,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_programs(Programs::new())
    }

    pub fn with_programs(programs: Programs) -> Self {
        Self::build(programs, None, Duration::ZERO)
    }

    /// A machine whose children take `delay` to load.
    pub fn with_load_delay(programs: Programs, delay: Duration) -> Self {
        Self::build(programs, None, delay)
    }

    /// A machine whose kernel logs to its console.
    pub fn with_logging(programs: Programs, level: log::LevelFilter) -> Self {
        Self::build(programs, Some(level), Duration::ZERO)
    }

    fn build(programs: Programs, level: Option<log::LevelFilter>, load_delay: Duration) -> Self {
        let fs = Arc::new(FsStats::default());
        let console = Arc::new(Console::new());
        let power = Arc::new(PowerSwitch::default());
        let mut builder = KernelBuilder::new()
            .filesystem(Box::new(MemFs(fs.clone())))
            .console(console.clone())
            .power(power.clone())
            .launcher(Box::new(ThreadLauncher {
                programs,
                load_delay,
            }));
        if let Some(level) = level {
            builder = builder.logging(level);
        }
        let kernel = builder.build().expect("complete configuration");
        Self {
            kernel,
            fs,
            console,
            power,
        }
    }

    /// Starts the first process, on the calling thread.
    pub fn boot(&self, cmd_line: &str) -> (Process, Arc<UserMemory>) {
        let mem = UserMemory::new();
        let process = Process::new(
            self.kernel.clone(),
            self.kernel.allocate_pid(),
            cmd_line,
            mem.clone(),
            None,
        );
        (process, mem)
    }
}
