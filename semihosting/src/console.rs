//! Leveled, colored line output over the host's `:tt` console.

use core::fmt::Write;

use heapless::String;
use log::debug;
use thiserror::Error;

use crate::config::ConsoleConfig;
use crate::syscalls::Semihosting;
use crate::trap::Trap;
use crate::types::{FileIOErrno, OpenMode, SemihostingResult};

const CONSOLE_PATH: &core::ffi::CStr = c":tt";

const ERROR_PREFIX: &str = "\x1b[31m[!]\x1b[0m ";
const WARNING_PREFIX: &str = "\x1b[33m[*]\x1b[0m ";
const NOTICE_PREFIX: &str = "\x1b[32m[~]\x1b[0m ";
const INFO_PREFIX: &str = "\x1b[36m[~]\x1b[0m ";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ConsoleError {
    #[error("could not open the console for reading")]
    OpenInput,
    #[error("could not open the console for writing")]
    OpenOutput,
    #[error("could not close the console input")]
    CloseInput,
    #[error("could not close the console output")]
    CloseOutput,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Error,
    Warning,
    Notice,
    Info,
}

impl Level {
    pub const fn prefix(self) -> &'static str {
        match self {
            Level::Error => ERROR_PREFIX,
            Level::Warning => WARNING_PREFIX,
            Level::Notice => NOTICE_PREFIX,
            Level::Info => INFO_PREFIX,
        }
    }
}

/// One piece of a console line. Each is sent with its own write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Arg<'a> {
    Text(&'a str),
    Signed(i64),
    Unsigned(u64),
    Bool(bool),
    /// A protocol enumeration, sent as its underlying value.
    Enumeration(i64),
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Text(value)
    }
}

impl From<bool> for Arg<'_> {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

macro_rules! widen {
    ($variant:ident => $wide:ty: $($narrow:ty),+) => {
        $(
            impl From<$narrow> for Arg<'_> {
                fn from(value: $narrow) -> Self {
                    Arg::$variant(value as $wide)
                }
            }
        )+
    };
}

widen!(Signed => i64: i8, i16, i32, i64, isize);
widen!(Unsigned => u64: u8, u16, u32, u64, usize);

impl From<FileIOErrno> for Arg<'_> {
    fn from(value: FileIOErrno) -> Self {
        Arg::Enumeration(value as i64)
    }
}

impl From<OpenMode> for Arg<'_> {
    fn from(value: OpenMode) -> Self {
        Arg::Enumeration(value as i64)
    }
}

impl From<SemihostingResult> for Arg<'_> {
    fn from(value: SemihostingResult) -> Self {
        Arg::Enumeration(value as i64)
    }
}

/// Widest rendering is `i64::MIN`.
type Digits = String<20>;

impl Arg<'_> {
    fn render(&self, digits: &mut Digits) {
        // Cannot overflow: every value fits in 20 characters.
        let _ = match *self {
            Arg::Signed(value) | Arg::Enumeration(value) => write!(digits, "{}", value),
            Arg::Unsigned(value) => write!(digits, "{}", value),
            Arg::Text(_) | Arg::Bool(_) => Ok(()),
        };
    }
}

/// The host console: a read handle and a write handle on `:tt`.
///
/// Starts closed. Output goes to whatever output descriptor is stored, whether
/// or not the console is currently open; neither [`Console::close`] nor a failed
/// [`Console::open`] discards it, so an error can still be reported through
/// the last good descriptor.
pub struct Console<'a, T> {
    host: &'a Semihosting<T>,
    config: ConsoleConfig,
    input: i32,
    output: i32,
    open: bool,
}

impl<'a, T: Trap> Console<'a, T> {
    pub const fn new(host: &'a Semihosting<T>, config: ConsoleConfig) -> Self {
        Self {
            host,
            config,
            input: -1,
            output: -1,
            open: false,
        }
    }

    pub fn host(&self) -> &'a Semihosting<T> {
        self.host
    }

    pub fn input_fd(&self) -> i32 {
        self.input
    }

    pub fn output_fd(&self) -> i32 {
        self.output
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Opens `:tt` for reading, then for writing. A handle is only replaced
    /// when its own open succeeds; if the write side fails, the read side is
    /// left open and the previous output descriptor stays in use. The console
    /// counts as closed until both opens succeed.
    pub fn open(&mut self) -> Result<(), ConsoleError> {
        self.open = false;
        let input = self.host.open(CONSOLE_PATH, OpenMode::Read);
        if input < 0 {
            return Err(ConsoleError::OpenInput);
        }
        self.input = input;
        let output = self.host.open(CONSOLE_PATH, OpenMode::Write);
        if output < 0 {
            return Err(ConsoleError::OpenOutput);
        }
        self.output = output;
        self.open = true;
        debug!("console open: input {}, output {}", input, output);
        Ok(())
    }

    /// Closes the read side, then the write side. A failure on the read side
    /// stops there, leaving the output usable to report it. The descriptor
    /// values are kept either way.
    pub fn close(&mut self) -> Result<(), ConsoleError> {
        if !self.host.close(self.input).is_success() {
            return Err(ConsoleError::CloseInput);
        }
        self.open = false;
        if !self.host.close(self.output).is_success() {
            return Err(ConsoleError::CloseOutput);
        }
        debug!("console closed");
        Ok(())
    }

    fn write(&self, text: &str) {
        // Console output is best effort; nothing useful can be done on failure.
        let _ = self.host.write(self.output, text.as_bytes());
    }

    fn write_arg(&self, arg: &Arg<'_>) {
        match *arg {
            Arg::Text(text) => self.write(text),
            Arg::Bool(value) => self.write(if value { "true" } else { "false" }),
            _ => {
                let mut digits = Digits::new();
                arg.render(&mut digits);
                self.write(&digits);
            }
        }
    }

    /// Writes each argument in order, then the line terminator.
    pub fn writeln(&self, args: &[Arg<'_>]) {
        for arg in args {
            self.write_arg(arg);
        }
        self.write(self.config.line_ending.as_str());
    }

    pub fn line(&self, level: Level, args: &[Arg<'_>]) {
        self.write(level.prefix());
        self.writeln(args);
    }

    pub fn error(&self, args: &[Arg<'_>]) {
        self.line(Level::Error, args);
    }

    pub fn warning(&self, args: &[Arg<'_>]) {
        self.line(Level::Warning, args);
    }

    pub fn warn(&self, args: &[Arg<'_>]) {
        self.warning(args);
    }

    pub fn notice(&self, args: &[Arg<'_>]) {
        self.line(Level::Notice, args);
    }

    pub fn info(&self, args: &[Arg<'_>]) {
        self.line(Level::Info, args);
    }
}

#[macro_export]
macro_rules! host_error {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.error(&[$($crate::console::Arg::from($arg)),+])
    };
}

#[macro_export]
macro_rules! host_warn {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.warning(&[$($crate::console::Arg::from($arg)),+])
    };
}

#[macro_export]
macro_rules! host_notice {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.notice(&[$($crate::console::Arg::from($arg)),+])
    };
}

#[macro_export]
macro_rules! host_info {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.info(&[$($crate::console::Arg::from($arg)),+])
    };
}
