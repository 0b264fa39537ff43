//! A simulated debug host for the unit tests.
//!
//! `MockHost` decodes the same parameter blocks a real probe would read out of
//! target memory, so the wire layout of every wrapper is exercised. Its
//! defaults mirror the reference host: `:tt` opens as descriptors 1 and 3, the
//! command line is `" how meow brown cow"`, elapsed time and tick frequency are
//! unsupported.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::slice;

use crate::timer::IntervalTimer;
use crate::trap::Trap;
use crate::types::{FileIOErrno, HeapInfoBlock, Syscall};

pub const CONSOLE_IN: i32 = 1;
pub const CONSOLE_OUT: i32 = 3;
const FEATURES: &[u8] = b"SHFB\x03";
const EPOCH: u32 = 1_700_000_000;
/// GDB File-I/O errno values the host classifies as errors.
const ERRNO_CODES: [i32; 21] = [
    1, 2, 4, 5, 9, 13, 14, 16, 17, 19, 20, 21, 22, 23, 24, 27, 28, 29, 30, 88, 91,
];

/// One recorded trap.
#[derive(Clone, Debug)]
pub struct Call {
    pub op: Syscall,
    /// The parameter block as the host saw it, or the immediate value alone.
    pub words: Vec<usize>,
}

#[derive(Clone, Debug)]
enum Handle {
    ConsoleIn,
    ConsoleOut,
    Features { position: usize },
    File { name: Vec<u8>, position: usize, readable: bool, writable: bool },
}

/// Knobs for steering the host into failure paths.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    pub refuse_console_input: bool,
    pub refuse_console_output: bool,
    pub refuse_close: Option<i32>,
    pub features: Option<Vec<u8>>,
    pub command_line: Option<Vec<u8>>,
    pub elapsed_ticks: Option<u64>,
    pub heap_info_noop: bool,
    pub temp_prefix: Option<&'static str>,
    pub clock_stalled: bool,
}

#[derive(Debug)]
pub struct HostState {
    pub files: BTreeMap<Vec<u8>, Vec<u8>>,
    handles: BTreeMap<i32, Handle>,
    next_fd: i32,
    errno: i32,
    pub calls: Vec<Call>,
    /// Everything written to the console output descriptor.
    pub console: Vec<u8>,
    /// Everything written with `SYS_WRITEC` and `SYS_WRITE0`.
    pub debug: Vec<u8>,
    pub faults: Faults,
}

impl HostState {
    pub fn console_text(&self) -> String {
        String::from_utf8_lossy(&self.console).into_owned()
    }

    pub fn ops(&self) -> Vec<Syscall> {
        self.calls.iter().map(|call| call.op).collect()
    }
}

pub struct MockHost {
    state: RefCell<HostState>,
    now_ms: Rc<Cell<u64>>,
}

impl MockHost {
    pub fn reference() -> Self {
        Self::with_faults(Faults::default())
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            state: RefCell::new(HostState {
                files: BTreeMap::new(),
                handles: BTreeMap::new(),
                next_fd: 4,
                errno: 0,
                calls: Vec::new(),
                console: Vec::new(),
                debug: Vec::new(),
                faults,
            }),
            now_ms: Rc::new(Cell::new(0)),
        }
    }

    pub fn state(&self) -> Ref<'_, HostState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, HostState> {
        self.state.borrow_mut()
    }

    /// A timer that advances this host's clock by 1 ms per poll.
    pub fn timer(&self) -> MockTimer {
        MockTimer {
            now_ms: Rc::clone(&self.now_ms),
            deadline: 0,
            polls: 0,
        }
    }
}

unsafe fn words<'a>(param: usize, count: usize) -> &'a [usize] {
    unsafe { slice::from_raw_parts(param as *const usize, count) }
}

unsafe fn bytes<'a>(address: usize, length: usize) -> &'a [u8] {
    unsafe { slice::from_raw_parts(address as *const u8, length) }
}

unsafe fn bytes_mut<'a>(address: usize, length: usize) -> &'a mut [u8] {
    unsafe { slice::from_raw_parts_mut(address as *mut u8, length) }
}

/// Reads a path the way a probe does: `length` bytes, which must be followed by a nul.
unsafe fn path(address: usize, length: usize) -> Vec<u8> {
    let with_nul = unsafe { bytes(address, length + 1) };
    assert_eq!(with_nul[length], 0, "path is not nul-terminated");
    with_nul[..length].to_vec()
}

unsafe fn c_string(address: usize) -> Vec<u8> {
    let mut text = Vec::new();
    let mut cursor = address as *const u8;
    loop {
        let byte = unsafe { *cursor };
        if byte == 0 {
            return text;
        }
        text.push(byte);
        cursor = unsafe { cursor.add(1) };
    }
}

fn temp_name(prefix: &str, target_id: u8) -> Vec<u8> {
    let mut name = prefix.as_bytes().to_vec();
    name.push(b'A' + (target_id >> 4));
    name.push(b'A' + (target_id & 0x0f));
    name.extend_from_slice(b".tmp");
    name
}

impl HostState {
    fn fail(&mut self, errno: FileIOErrno) -> i32 {
        self.errno = errno as i32;
        -1
    }

    fn open(&mut self, name: Vec<u8>, mode: usize) -> i32 {
        let readable = mode < 4 || matches!(mode, 6 | 7 | 10 | 11);
        let writable = mode >= 4 || matches!(mode, 2 | 3);
        if name == b":tt" {
            if mode < 4 {
                if self.faults.refuse_console_input {
                    return self.fail(FileIOErrno::NoSuchDevice);
                }
                self.handles.insert(CONSOLE_IN, Handle::ConsoleIn);
                return CONSOLE_IN;
            }
            if self.faults.refuse_console_output {
                return self.fail(FileIOErrno::NoSuchDevice);
            }
            self.handles.insert(CONSOLE_OUT, Handle::ConsoleOut);
            return CONSOLE_OUT;
        }
        let handle = if name == b":semihosting-features" {
            if mode >= 4 {
                return self.fail(FileIOErrno::AccessError);
            }
            Handle::Features { position: 0 }
        } else {
            match mode {
                0..=3 if !self.files.contains_key(&name) => {
                    return self.fail(FileIOErrno::NoSuchEntity)
                }
                4..=7 => {
                    self.files.insert(name.clone(), Vec::new());
                }
                8..=11 => {
                    self.files.entry(name.clone()).or_default();
                }
                _ => {}
            }
            let position = if mode >= 8 { self.files[&name].len() } else { 0 };
            Handle::File { name, position, readable, writable }
        };
        let fd = self.next_fd;
        self.next_fd += 1;
        self.handles.insert(fd, handle);
        fd
    }

    fn features(&self) -> Vec<u8> {
        self.faults.features.clone().unwrap_or_else(|| FEATURES.to_vec())
    }

    fn write(&mut self, fd: i32, data: &[u8]) -> i32 {
        let length = data.len() as i32;
        match self.handles.get_mut(&fd) {
            Some(Handle::ConsoleOut) => {
                self.console.extend_from_slice(data);
                0
            }
            Some(Handle::File { name, position, writable: true, .. }) => {
                let file = self.files.entry(name.clone()).or_default();
                let end = *position + data.len();
                if file.len() < end {
                    file.resize(end, 0);
                }
                file[*position..end].copy_from_slice(data);
                *position = end;
                0
            }
            _ => {
                self.errno = FileIOErrno::BadFd as i32;
                length
            }
        }
    }

    fn read(&mut self, fd: i32, buffer: &mut [u8]) -> i32 {
        let features = self.features();
        let (source, position) = match self.handles.get_mut(&fd) {
            Some(Handle::Features { position }) => (features, position),
            Some(Handle::File { name, position, readable: true, .. }) => {
                (self.files.get(name.as_slice()).cloned().unwrap_or_default(), position)
            }
            Some(Handle::ConsoleIn) => return buffer.len() as i32,
            _ => {
                self.errno = FileIOErrno::BadFd as i32;
                return -1;
            }
        };
        let available = source.len().saturating_sub(*position);
        let count = available.min(buffer.len());
        buffer[..count].copy_from_slice(&source[*position..*position + count]);
        *position += count;
        (buffer.len() - count) as i32
    }

    fn length(&mut self, fd: i32) -> i32 {
        match self.handles.get(&fd) {
            Some(Handle::Features { .. }) => self.features().len() as i32,
            Some(Handle::File { name, .. }) => {
                self.files.get(name.as_slice()).map_or(0, Vec::len) as i32
            }
            Some(_) => self.fail(FileIOErrno::IllegalSeek),
            None => self.fail(FileIOErrno::BadFd),
        }
    }

    fn seek(&mut self, fd: i32, offset: usize) -> i32 {
        match self.handles.get_mut(&fd) {
            Some(Handle::Features { position }) | Some(Handle::File { position, .. }) => {
                *position = offset;
                0
            }
            Some(_) => self.fail(FileIOErrno::IllegalSeek),
            None => self.fail(FileIOErrno::BadFd),
        }
    }

    fn close(&mut self, fd: i32) -> i32 {
        if self.faults.refuse_close == Some(fd) {
            return self.fail(FileIOErrno::IoError);
        }
        match self.handles.remove(&fd) {
            Some(_) => 0,
            None => self.fail(FileIOErrno::BadFd),
        }
    }

    fn remove(&mut self, name: &[u8]) -> i32 {
        match self.files.remove(name) {
            Some(_) => 0,
            None => self.fail(FileIOErrno::NoSuchEntity),
        }
    }

    fn rename(&mut self, old_name: &[u8], new_name: Vec<u8>) -> i32 {
        match self.files.remove(old_name) {
            Some(contents) => {
                self.files.insert(new_name, contents);
                0
            }
            None => self.fail(FileIOErrno::NoSuchEntity),
        }
    }
}

impl Trap for MockHost {
    unsafe fn syscall(&self, op: Syscall, param: usize) -> i32 {
        let now_ms = self.now_ms.get();
        let mut state = self.state.borrow_mut();
        let block_words = match op {
            Syscall::Close
            | Syscall::IsError
            | Syscall::IsTty
            | Syscall::FileLength
            | Syscall::HeapInfo => 1,
            Syscall::Seek | Syscall::Remove | Syscall::System | Syscall::ReadCommandLine => 2,
            Syscall::ExitExtended => 2,
            Syscall::Open | Syscall::Write | Syscall::Read | Syscall::TempName => 3,
            Syscall::Rename => 4,
            _ => 0,
        };
        let block = if block_words == 0 {
            vec![param]
        } else {
            unsafe { words(param, block_words) }.to_vec()
        };
        state.calls.push(Call { op, words: block.clone() });

        match op {
            Syscall::Open => {
                let name = unsafe { path(block[0], block[2]) };
                state.open(name, block[1])
            }
            Syscall::Close => state.close(block[0] as i32),
            Syscall::WriteChar => {
                let chr = unsafe { *(param as *const u8) };
                state.debug.push(chr);
                0
            }
            Syscall::WriteNulString => {
                let text = unsafe { c_string(param) };
                state.debug.extend_from_slice(&text);
                0
            }
            Syscall::Write => {
                let data = unsafe { bytes(block[1], block[2]) };
                state.write(block[0] as i32, data)
            }
            Syscall::Read => {
                let buffer = unsafe { bytes_mut(block[1], block[2]) };
                state.read(block[0] as i32, buffer)
            }
            Syscall::ReadChar => -1,
            Syscall::IsError => {
                let status = block[0] as i32;
                ERRNO_CODES.contains(&status) as i32
            }
            Syscall::IsTty => {
                let fd = block[0] as i32;
                match state.handles.get(&fd) {
                    Some(Handle::ConsoleIn | Handle::ConsoleOut) => 1,
                    Some(_) => 0,
                    None => state.fail(FileIOErrno::BadFd),
                }
            }
            Syscall::Seek => state.seek(block[0] as i32, block[1]),
            Syscall::FileLength => state.length(block[0] as i32),
            Syscall::TempName => {
                let prefix = state.faults.temp_prefix.unwrap_or("temp");
                let name = temp_name(prefix, block[1] as u8);
                if name.len() + 1 > block[2] {
                    return state.fail(FileIOErrno::FileNameTooLong);
                }
                let buffer = unsafe { bytes_mut(block[0], block[2]) };
                buffer[..name.len()].copy_from_slice(&name);
                buffer[name.len()] = 0;
                0
            }
            Syscall::Remove => {
                let name = unsafe { path(block[0], block[1]) };
                state.remove(&name)
            }
            Syscall::Rename => {
                let old_name = unsafe { path(block[0], block[1]) };
                let new_name = unsafe { path(block[2], block[3]) };
                state.rename(&old_name, new_name)
            }
            Syscall::Clock if state.faults.clock_stalled => 0,
            Syscall::Clock => (now_ms / 10) as i32,
            Syscall::Time => (EPOCH as u64 + now_ms / 1000) as u32 as i32,
            Syscall::System => state.fail(FileIOErrno::NotPermitted),
            Syscall::LastErrno => state.errno,
            Syscall::ReadCommandLine => {
                let command_line = state
                    .faults
                    .command_line
                    .clone()
                    .unwrap_or_else(|| b" how meow brown cow".to_vec());
                if command_line.len() + 1 > block[1] {
                    return state.fail(FileIOErrno::ArgumentInvalid);
                }
                let buffer = unsafe { bytes_mut(block[0], block[1]) };
                buffer[..command_line.len()].copy_from_slice(&command_line);
                buffer[command_line.len()] = 0;
                // The host reports the length back through the block.
                unsafe { *(param as *mut usize).add(1) = command_line.len() };
                0
            }
            Syscall::HeapInfo => {
                if !state.faults.heap_info_noop {
                    let info = unsafe { &mut *(block[0] as *mut HeapInfoBlock) };
                    *info = HeapInfoBlock {
                        heap_base: 0x2000_1000,
                        heap_limit: 0x2001_0000,
                        stack_base: 0x2002_0000,
                        stack_limit: 0x2001_8000,
                    };
                }
                0
            }
            Syscall::Exit => panic!("exit {:#x}", param),
            Syscall::ExitExtended => panic!("exit {:#x} status {}", block[0], block[1]),
            Syscall::ElapsedTime => match state.faults.elapsed_ticks {
                Some(ticks) => {
                    unsafe { *(param as *mut u64) = ticks };
                    0
                }
                None => state.fail(FileIOErrno::SyscallInvalid),
            },
            Syscall::TickFrequency => -1,
        }
    }
}

/// Busy-poll timer tied to a [`MockHost`] clock.
pub struct MockTimer {
    now_ms: Rc<Cell<u64>>,
    deadline: u64,
    pub polls: u64,
}

impl IntervalTimer for MockTimer {
    fn start(&mut self, millis: u32) {
        self.deadline = self.now_ms.get() + millis as u64;
    }

    fn expired(&mut self) -> bool {
        self.polls += 1;
        if self.now_ms.get() >= self.deadline {
            return true;
        }
        self.now_ms.set(self.now_ms.get() + 1);
        false
    }
}
