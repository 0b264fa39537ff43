//! Compile-time configuration: console formatting and the behaviour expected
//! of the reference debug host.

use core::ffi::CStr;

/// Line terminator appended to every console line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub const fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ConsoleConfig {
    pub line_ending: LineEnding,
}

/// What a particular debug host is known to answer. These are conventions of
/// the host rather than anything the protocol defines, so they are checked
/// against literal values instead of being derived.
#[derive(Copy, Clone, Debug)]
pub struct HostProfile {
    /// Descriptors `:tt` opens as, read side then write side.
    pub console_fds: (i32, i32),
    /// Command line the host is started with.
    pub command_line: &'static str,
    /// Target id passed to `SYS_TMPNAM` and the name the host answers with.
    pub temp_name: (u8, &'static str),
    /// Required `:semihosting-features` feature byte.
    pub features: u8,
    /// Scratch file for the file I/O tests and the name it is renamed to.
    pub scratch_file: &'static CStr,
    pub renamed_file: &'static CStr,
    /// A file that must not exist on the host.
    pub missing_file: &'static CStr,
    /// `SYS_CLOCK` must advance by 100 centiseconds across a one second wait,
    /// give or take this much.
    pub clock_tolerance_cs: i32,
    /// Accepted `SYS_TIME` advance, in seconds, across a two second wait.
    pub time_advance_s: (u32, u32),
}

/// The Black Magic Probe driven from GDB.
pub const REFERENCE_HOST: HostProfile = HostProfile {
    console_fds: (1, 3),
    command_line: " how meow brown cow",
    temp_name: (10, "tempAK.tmp"),
    features: 3,
    scratch_file: c"semihosting-test.txt",
    renamed_file: c"semihosting-renamed.txt",
    missing_file: c"semihosting-missing.txt",
    clock_tolerance_cs: 10,
    time_advance_s: (1, 3),
};

#[derive(Copy, Clone, Debug)]
pub struct SuiteConfig {
    pub console: ConsoleConfig,
    pub host: HostProfile,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            host: REFERENCE_HOST,
        }
    }
}
