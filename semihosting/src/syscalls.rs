//! Typed wrappers, one per semihosting operation.
//!
//! Each wrapper builds its parameter block on the stack, issues exactly one
//! trap and hands the raw answer back in the shape the operation defines. No
//! wrapper retries or interprets failures beyond that; callers decide.

use core::ffi::CStr;
use core::hint;

use log::trace;

use crate::trap::Trap;
use crate::types::{
    ExitReason, FileIOErrno, HeapInfoBlock, OpenMode, SemihostingResult, Syscall,
};

/// The syscall bridge over some [`Trap`].
#[derive(Debug)]
pub struct Semihosting<T> {
    trap: T,
}

impl<T> Semihosting<T> {
    pub const fn new(trap: T) -> Self {
        Self { trap }
    }

    pub fn trap(&self) -> &T {
        &self.trap
    }
}

impl<T: Trap> Semihosting<T> {
    fn call(&self, op: Syscall, param: usize) -> i32 {
        // SAFETY: every wrapper below passes either an immediate or a block that
        // lives on its own stack frame for the duration of this call.
        let result = unsafe { self.trap.syscall(op, param) };
        trace!("{} -> {}", op, result);
        result
    }

    fn call_block<const N: usize>(&self, op: Syscall, block: &[usize; N]) -> i32 {
        self.call(op, block.as_ptr() as usize)
    }

    fn call_block_mut<const N: usize>(&self, op: Syscall, block: &mut [usize; N]) -> i32 {
        self.call(op, block.as_mut_ptr() as usize)
    }

    /// Opens `path` on the host. Returns the descriptor, or a value ≤ 0 on
    /// failure. An empty path is rejected without trapping.
    pub fn open(&self, path: &CStr, mode: OpenMode) -> i32 {
        let name = path.to_bytes();
        if name.is_empty() {
            trace!("{} refused for an empty path", Syscall::Open);
            return -1;
        }
        let block = [name.as_ptr() as usize, mode as usize, name.len()];
        self.call_block(Syscall::Open, &block)
    }

    /// Closing the same descriptor twice is undefined; the value is not
    /// invalidated here.
    pub fn close(&self, fd: i32) -> SemihostingResult {
        self.call_block(Syscall::Close, &[fd as usize]).into()
    }

    pub fn write_char(&self, chr: u8) -> SemihostingResult {
        self.call(Syscall::WriteChar, &chr as *const u8 as usize).into()
    }

    /// Writes a nul-terminated string to the host's debug channel.
    pub fn write0(&self, string: &CStr) -> SemihostingResult {
        self.call(Syscall::WriteNulString, string.as_ptr() as usize).into()
    }

    /// [`Self::write0`] without the trace record, for the logger.
    pub(crate) fn write0_quiet(&self, string: &CStr) {
        // SAFETY: `string` is nul-terminated and borrowed for the whole call.
        unsafe { self.trap.syscall(Syscall::WriteNulString, string.as_ptr() as usize) };
    }

    /// Returns the number of bytes NOT written; 0 means all of `data` went out.
    pub fn write(&self, fd: i32, data: &[u8]) -> i32 {
        let block = [fd as usize, data.as_ptr() as usize, data.len()];
        self.call_block(Syscall::Write, &block)
    }

    /// Returns the number of bytes NOT read; 0 means `data` was filled.
    pub fn read(&self, fd: i32, data: &mut [u8]) -> i32 {
        let block = [fd as usize, data.as_mut_ptr() as usize, data.len()];
        self.call_block(Syscall::Read, &block)
    }

    pub fn read_char(&self) -> i32 {
        self.call(Syscall::ReadChar, 0)
    }

    pub fn is_error(&self, status: i32) -> bool {
        self.call_block(Syscall::IsError, &[status as usize]) != 0
    }

    /// 1 if `fd` is an interactive device, 0 if not.
    pub fn is_tty(&self, fd: i32) -> i32 {
        self.call_block(Syscall::IsTty, &[fd as usize])
    }

    /// Seeks to an absolute byte offset.
    pub fn seek(&self, fd: i32, offset: u32) -> SemihostingResult {
        self.call_block(Syscall::Seek, &[fd as usize, offset as usize]).into()
    }

    /// Returns the length of the file, or -1.
    pub fn file_length(&self, fd: i32) -> i32 {
        self.call_block(Syscall::FileLength, &[fd as usize])
    }

    /// Asks the host for a temporary file name unique to `target_id`. The name
    /// format belongs to the host.
    pub fn temp_name(&self, name: &mut [u8], target_id: u8) -> SemihostingResult {
        let block = [name.as_mut_ptr() as usize, target_id as usize, name.len()];
        self.call_block(Syscall::TempName, &block).into()
    }

    pub fn remove(&self, path: &CStr) -> SemihostingResult {
        let name = path.to_bytes();
        self.call_block(Syscall::Remove, &[name.as_ptr() as usize, name.len()]).into()
    }

    pub fn rename(&self, old_path: &CStr, new_path: &CStr) -> SemihostingResult {
        let old_name = old_path.to_bytes();
        let new_name = new_path.to_bytes();
        let block = [
            old_name.as_ptr() as usize,
            old_name.len(),
            new_name.as_ptr() as usize,
            new_name.len(),
        ];
        self.call_block(Syscall::Rename, &block).into()
    }

    /// Centiseconds since the program started.
    pub fn clock(&self) -> i32 {
        self.call(Syscall::Clock, 0)
    }

    /// Seconds since the Unix epoch.
    pub fn time(&self) -> u32 {
        self.call(Syscall::Time, 0) as u32
    }

    /// Runs `command` on the host and returns its status.
    pub fn system(&self, command: &CStr) -> i32 {
        let text = command.to_bytes();
        self.call_block(Syscall::System, &[text.as_ptr() as usize, text.len()])
    }

    /// The host's errno. Only meaningful straight after a failed call.
    pub fn last_errno_raw(&self) -> i32 {
        self.call(Syscall::LastErrno, 0)
    }

    /// [`Self::last_errno_raw`], classified. `None` for 0 and for codes outside
    /// the [`FileIOErrno`] table.
    pub fn last_errno(&self) -> Option<FileIOErrno> {
        FileIOErrno::try_from(self.last_errno_raw()).ok()
    }

    /// Fills `command_line` with the host-supplied command line. The result
    /// is not nul-terminated if it fills the buffer exactly; see
    /// [`nul_terminated`].
    pub fn read_command_line(&self, command_line: &mut [u8]) -> SemihostingResult {
        let mut block = [command_line.as_mut_ptr() as usize, command_line.len()];
        self.call_block_mut(Syscall::ReadCommandLine, &mut block).into()
    }

    /// The host writes the four fields of `info` in place, or leaves them
    /// alone if it has nothing to report.
    pub fn heap_info(&self, info: &mut HeapInfoBlock) {
        let block = [info as *mut HeapInfoBlock as usize];
        self.call_block(Syscall::HeapInfo, &block);
    }

    /// Reports `reason` to the host and never returns.
    pub fn exit(&self, reason: ExitReason) -> ! {
        self.call(Syscall::Exit, reason.into());
        halt()
    }

    /// Reports `reason` with a status code and never returns.
    pub fn exit_extended(&self, reason: ExitReason, status: usize) -> ! {
        self.call_block(Syscall::ExitExtended, &[reason.into(), status]);
        halt()
    }

    /// Reads the host's elapsed tick counter into `ticks`. Hosts without the
    /// counter fail and must leave `ticks` untouched; the pointer is handed to
    /// the host as-is so that behaviour is observable.
    pub fn elapsed_time(&self, ticks: &mut u64) -> SemihostingResult {
        self.call(Syscall::ElapsedTime, ticks as *mut u64 as usize).into()
    }

    /// Ticks per second of the elapsed counter, or -1 if unsupported.
    pub fn tick_frequency(&self) -> i32 {
        self.call(Syscall::TickFrequency, 0)
    }
}

/// The prefix of `buffer` before its first nul, or all of it if there is none.
pub fn nul_terminated(buffer: &[u8]) -> &[u8] {
    let length = buffer
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(buffer.len());
    &buffer[..length]
}

fn halt() -> ! {
    loop {
        hint::spin_loop();
    }
}
