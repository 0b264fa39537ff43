//! `log` backend that prints through `SYS_WRITE0`.
//!
//! It needs no descriptor, so it works before the console is open and does not
//! disturb the descriptor numbers the host hands out for `:tt`.

use core::ffi::CStr;
use core::fmt::{self, Write};

use heapless::String;
use log::{LevelFilter, Metadata, Record};

use crate::syscalls::Semihosting;
use crate::trap::Trap;

/// Longest record, nul included. Longer records are truncated.
const RECORD_CAPACITY: usize = 160;

pub struct HostLogger<T> {
    host: Semihosting<T>,
    level: LevelFilter,
}

impl<T> HostLogger<T> {
    pub const fn new(host: Semihosting<T>, level: LevelFilter) -> Self {
        Self { host, level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

/// Writes into the record buffer until only room for the newline and the nul
/// is left.
struct Truncating<'a>(&'a mut String<RECORD_CAPACITY>);

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        for chr in text.chars() {
            if self.0.len() + chr.len_utf8() > RECORD_CAPACITY - 2 {
                return Err(fmt::Error);
            }
            self.0.push(chr).map_err(|()| fmt::Error)?;
        }
        Ok(())
    }
}

fn format_record(record: &Record<'_>, line: &mut String<RECORD_CAPACITY>) {
    // Running out of room only truncates the record.
    let _ = write!(
        Truncating(&mut *line),
        "[{} {}] {}",
        record.level(),
        record.target(),
        record.args()
    );
    let _ = line.push('\n');
    let _ = line.push('\0');
}

impl<T: Trap + Send + Sync> log::Log for HostLogger<T> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line = String::<RECORD_CAPACITY>::new();
        format_record(record, &mut line);
        if let Ok(text) = CStr::from_bytes_until_nul(line.as_bytes()) {
            self.host.write0_quiet(text);
        }
    }

    fn flush(&self) {}
}
