//! The semihosting self-test suite.
//!
//! Tests run in a fixed order and the first failure ends the run. Every test
//! announces itself, reports each step it completes as a notice and the step
//! that failed as an error.

use core::ffi::CStr;
use core::fmt::Write;

use heapless::String;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{HostProfile, SuiteConfig};
use crate::console::{Console, ConsoleError};
use crate::syscalls::{nul_terminated, Semihosting};
use crate::timer::IntervalTimer;
use crate::trap::Trap;
use crate::types::{FileIOErrno, HeapInfoBlock, OpenMode, Syscall};
use crate::{host_error, host_info, host_notice, host_warn};

const FEATURES_FILE: &CStr = c":semihosting-features";
const FEATURES_MAGIC: [u8; 4] = *b"SHFB";
/// Magic plus the first feature byte.
const FEATURES_MIN_LENGTH: i32 = 5;
const COMMAND_LINE_CAPACITY: usize = 80;
const TEMP_NAME_CAPACITY: usize = 32;
const ALPHABET: &[u8; 28] = b"abcdefghijklmnopqrstuvwxyz\r\n";
/// Error codes fed to `SYS_ISERROR`, from 0 up.
const PROBED_CODES: i32 = 100;
const CLOCK_WAIT_MS: u32 = 1000;
const TIME_WAIT_MS: u32 = 2000;
const HEAP_SENTINEL: HeapInfoBlock = HeapInfoBlock {
    heap_base: 0x5a5a_5a5a,
    heap_limit: 0xa5a5_a5a5,
    stack_base: 0x5a5a_5a5a,
    stack_limit: 0xa5a5_a5a5,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum Failure {
    #[error("{0} failed")]
    Syscall(Syscall),
    #[error("{0} returned an unexpected value")]
    Unexpected(Syscall),
    #[error(transparent)]
    Console(#[from] ConsoleError),
}

pub type TestResult = Result<(), Failure>;

type Test<S> = (&'static str, fn(&mut S) -> TestResult);

fn display(path: &CStr) -> &str {
    path.to_str().unwrap_or("<non UTF-8 path>")
}

pub struct Suite<'c, 'h, T, M> {
    console: &'c mut Console<'h, T>,
    timer: &'c mut M,
    profile: HostProfile,
}

impl<'c, 'h, T: Trap, M: IntervalTimer> Suite<'c, 'h, T, M> {
    pub fn new(console: &'c mut Console<'h, T>, timer: &'c mut M, profile: HostProfile) -> Self {
        Self {
            console,
            timer,
            profile,
        }
    }

    fn host(&self) -> &'h Semihosting<T> {
        self.console.host()
    }

    /// Runs every test in order, stopping at the first failure.
    pub fn run_tests(&mut self) -> TestResult {
        let tests: [Test<Self>; 12] = [
            ("command line", Self::command_line),
            ("console handles", Self::console_handles),
            ("isatty", Self::is_tty),
            ("semihosting features", Self::semihosting_features),
            ("isError", Self::is_error),
            ("tempName", Self::temp_name),
            ("file I/O", Self::file_io),
            ("errno", Self::errno),
            ("timing", Self::timing),
            ("intervals", Self::intervals),
            ("heap info", Self::heap_info),
            ("character output", Self::character_output),
        ];
        for (name, test) in tests {
            debug!("running {}", name);
            host_warn!(self.console, "Testing ", name);
            test(self)?;
        }
        Ok(())
    }

    fn trying(&self, op: Syscall, target: &str) {
        host_info!(self.console, "Trying ", op.name(), " on ", target);
    }

    fn succeeded(&self, op: Syscall) {
        host_notice!(self.console, op.name(), " success");
    }

    fn failed(&self, op: Syscall) -> Failure {
        host_error!(self.console, op.name(), " failed");
        Failure::Syscall(op)
    }

    /// Gives up on an open descriptor: closes it and passes `failure` on.
    fn abandon(&self, fd: i32, failure: Failure) -> Failure {
        if !self.host().close(fd).is_success() {
            host_error!(self.console, "Additionally ", Syscall::Close.name(), " failed");
        }
        failure
    }

    fn expect_errno(&self, expected: FileIOErrno) -> TestResult {
        let errno = self.host().last_errno_raw();
        if FileIOErrno::try_from(errno) != Ok(expected) {
            host_error!(
                self.console,
                Syscall::LastErrno.name(),
                " returned ",
                errno,
                ", expected ",
                expected
            );
            return Err(Failure::Unexpected(Syscall::LastErrno));
        }
        host_notice!(
            self.console,
            Syscall::LastErrno.name(),
            " returned ",
            expected,
            " as expected"
        );
        Ok(())
    }

    fn command_line(&mut self) -> TestResult {
        self.trying(Syscall::ReadCommandLine, "the host");
        let mut buffer = [0u8; COMMAND_LINE_CAPACITY];
        if !self.host().read_command_line(&mut buffer).is_success() {
            return Err(self.failed(Syscall::ReadCommandLine));
        }
        let command_line = nul_terminated(&buffer);
        if command_line != self.profile.command_line.as_bytes() {
            let shown = core::str::from_utf8(command_line).unwrap_or("<non UTF-8>");
            host_error!(self.console, "Wrong command line string value: '", shown, "'");
            return Err(Failure::Unexpected(Syscall::ReadCommandLine));
        }
        self.succeeded(Syscall::ReadCommandLine);
        Ok(())
    }

    fn console_handles(&mut self) -> TestResult {
        self.trying(Syscall::Close, "special name ':tt'");
        if let Err(error) = self.console.close() {
            host_error!(self.console, Syscall::Close.name(), " failed");
            return Err(error.into());
        }
        // The output descriptor outlives the close, so this may still get through.
        self.succeeded(Syscall::Close);
        self.trying(Syscall::Open, "special name ':tt'");
        if let Err(error) = self.console.open() {
            // Nothing else can be done without a console, but the old output
            // descriptor is still stored, so try to say so.
            host_error!(self.console, Syscall::Open.name(), " failed");
            return Err(error.into());
        }
        self.succeeded(Syscall::Open);

        let fds = (self.console.input_fd(), self.console.output_fd());
        host_info!(
            self.console,
            Syscall::Open.name(),
            " returned FDs ",
            fds.0,
            ", and ",
            fds.1,
            " for console I/O"
        );
        if fds != self.profile.console_fds {
            host_error!(self.console, "Improper I/O handles returned for special name ':tt'");
            return Err(Failure::Unexpected(Syscall::Open));
        }
        Ok(())
    }

    fn is_tty(&mut self) -> TestResult {
        let host = self.host();
        for (side, fd) in [
            ("console input", self.console.input_fd()),
            ("console output", self.console.output_fd()),
        ] {
            self.trying(Syscall::IsTty, side);
            let result = host.is_tty(fd);
            if result != 1 {
                host_error!(
                    self.console,
                    Syscall::IsTty.name(),
                    " returned ",
                    result,
                    " for ",
                    side
                );
                return Err(Failure::Unexpected(Syscall::IsTty));
            }
            self.succeeded(Syscall::IsTty);
        }

        let scratch = self.profile.scratch_file;
        self.trying(Syscall::IsTty, display(scratch));
        let fd = host.open(scratch, OpenMode::Write);
        if fd <= 0 {
            return Err(self.failed(Syscall::Open));
        }
        let result = host.is_tty(fd);
        if !host.close(fd).is_success() {
            return Err(self.failed(Syscall::Close));
        }
        if !host.remove(scratch).is_success() {
            return Err(self.failed(Syscall::Remove));
        }
        if result != 0 {
            host_error!(
                self.console,
                Syscall::IsTty.name(),
                " returned ",
                result,
                " for a plain file"
            );
            return Err(Failure::Unexpected(Syscall::IsTty));
        }
        self.succeeded(Syscall::IsTty);
        Ok(())
    }

    fn semihosting_features(&mut self) -> TestResult {
        let host = self.host();
        let target = display(FEATURES_FILE);
        self.trying(Syscall::Open, target);
        let fd = host.open(FEATURES_FILE, OpenMode::Read);
        if fd <= 0 {
            return Err(self.failed(Syscall::Open));
        }
        self.succeeded(Syscall::Open);

        self.trying(Syscall::FileLength, target);
        let length = host.file_length(fd);
        if length < FEATURES_MIN_LENGTH {
            let reason = if length == -1 {
                "length couldn't be determined"
            } else {
                "too short"
            };
            host_error!(self.console, Syscall::FileLength.name(), " failed, file ", reason);
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::FileLength)));
        }
        self.succeeded(Syscall::FileLength);

        self.trying(Syscall::Read, target);
        let mut magic = [0u8; 4];
        if host.read(fd, &mut magic) != 0 {
            let failure = self.failed(Syscall::Read);
            return Err(self.abandon(fd, failure));
        }
        if magic != FEATURES_MAGIC {
            host_error!(self.console, "Invalid '", target, "' magic number");
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::Read)));
        }
        let mut features = [0u8; 1];
        if host.read(fd, &mut features) != 0 {
            let failure = self.failed(Syscall::Read);
            return Err(self.abandon(fd, failure));
        }
        if features[0] != self.profile.features {
            host_error!(
                self.console,
                "Unexpected feature bits ",
                features[0],
                ", expected ",
                self.profile.features
            );
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::Read)));
        }
        self.succeeded(Syscall::Read);

        self.trying(Syscall::Close, target);
        if !host.close(fd).is_success() {
            return Err(self.failed(Syscall::Close));
        }
        self.succeeded(Syscall::Close);
        host_notice!(self.console, "Access to '", target, "' successful");
        Ok(())
    }

    fn is_error(&mut self) -> TestResult {
        let host = self.host();
        self.trying(Syscall::IsError, "codes 0 through 99");
        for code in 0..PROBED_CODES {
            let expected = FileIOErrno::try_from(code).is_ok();
            let actual = host.is_error(code);
            if actual != expected {
                host_error!(
                    self.console,
                    Syscall::IsError.name(),
                    " classified ",
                    code,
                    " as ",
                    actual,
                    ", expected ",
                    expected
                );
                return Err(Failure::Unexpected(Syscall::IsError));
            }
        }
        self.succeeded(Syscall::IsError);
        Ok(())
    }

    fn temp_name(&mut self) -> TestResult {
        let (target_id, expected) = self.profile.temp_name;
        self.trying(Syscall::TempName, "the host");
        let mut buffer = [0u8; TEMP_NAME_CAPACITY];
        if !self.host().temp_name(&mut buffer, target_id).is_success() {
            return Err(self.failed(Syscall::TempName));
        }
        let name = nul_terminated(&buffer);
        if name != expected.as_bytes() {
            let shown = core::str::from_utf8(name).unwrap_or("<non UTF-8>");
            host_error!(self.console, "Wrong temporary name '", shown, "' for target ", target_id);
            return Err(Failure::Unexpected(Syscall::TempName));
        }
        self.succeeded(Syscall::TempName);
        Ok(())
    }

    fn file_io(&mut self) -> TestResult {
        let host = self.host();
        let scratch = self.profile.scratch_file;
        let renamed = self.profile.renamed_file;
        let expected_length = ALPHABET.len() as i32;

        self.trying(Syscall::Open, display(scratch));
        let fd = host.open(scratch, OpenMode::WriteBinary);
        if fd <= 0 {
            return Err(self.failed(Syscall::Open));
        }
        self.succeeded(Syscall::Open);

        self.trying(Syscall::Write, display(scratch));
        let unwritten = host.write(fd, ALPHABET);
        if unwritten != 0 {
            host_error!(
                self.console,
                Syscall::Write.name(),
                " left ",
                unwritten,
                " bytes unwritten"
            );
            return Err(self.abandon(fd, Failure::Syscall(Syscall::Write)));
        }
        self.succeeded(Syscall::Write);

        let length = host.file_length(fd);
        if length != expected_length {
            host_error!(
                self.console,
                Syscall::FileLength.name(),
                " returned ",
                length,
                ", expected ",
                expected_length
            );
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::FileLength)));
        }
        self.succeeded(Syscall::FileLength);

        if !host.close(fd).is_success() {
            return Err(self.failed(Syscall::Close));
        }
        self.succeeded(Syscall::Close);

        self.trying(Syscall::Write, "a closed descriptor");
        if host.write(fd, ALPHABET) == 0 {
            host_error!(self.console, Syscall::Write.name(), " succeeded on a closed descriptor");
            return Err(Failure::Unexpected(Syscall::Write));
        }
        host_notice!(self.console, Syscall::Write.name(), " refused as expected");

        self.trying(Syscall::Rename, display(scratch));
        if !host.rename(scratch, renamed).is_success() {
            return Err(self.failed(Syscall::Rename));
        }
        self.succeeded(Syscall::Rename);

        self.trying(Syscall::Open, display(renamed));
        let fd = host.open(renamed, OpenMode::ReadBinary);
        if fd <= 0 {
            return Err(self.failed(Syscall::Open));
        }
        self.succeeded(Syscall::Open);

        self.trying(Syscall::Read, display(renamed));
        let mut contents = [0u8; ALPHABET.len()];
        let unread = host.read(fd, &mut contents);
        if unread != 0 {
            host_error!(self.console, Syscall::Read.name(), " left ", unread, " bytes unread");
            return Err(self.abandon(fd, Failure::Syscall(Syscall::Read)));
        }
        if contents != *ALPHABET {
            host_error!(self.console, "Data read back does not match what was written");
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::Read)));
        }
        self.succeeded(Syscall::Read);

        let offset = ALPHABET.len() as u32 - 2;
        self.trying(Syscall::Seek, display(renamed));
        if !host.seek(fd, offset).is_success() {
            let failure = self.failed(Syscall::Seek);
            return Err(self.abandon(fd, failure));
        }
        let mut tail = [0u8; 2];
        if host.read(fd, &mut tail) != 0 || tail != *b"\r\n" {
            host_error!(self.console, "Wrong data after ", Syscall::Seek.name(), " to ", offset);
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::Seek)));
        }
        self.succeeded(Syscall::Seek);

        // At end of file nothing is transferred, so the whole request is unread.
        let unread = host.read(fd, &mut tail);
        if unread != tail.len() as i32 {
            host_error!(self.console, Syscall::Read.name(), " at end of file returned ", unread);
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::Read)));
        }

        if !host.close(fd).is_success() {
            return Err(self.failed(Syscall::Close));
        }
        self.trying(Syscall::Remove, display(renamed));
        if !host.remove(renamed).is_success() {
            return Err(self.failed(Syscall::Remove));
        }
        self.succeeded(Syscall::Remove);
        Ok(())
    }

    fn errno(&mut self) -> TestResult {
        let host = self.host();
        let scratch = self.profile.scratch_file;
        let missing = self.profile.missing_file;

        self.trying(Syscall::Remove, display(scratch));
        if host.remove(scratch).is_success() {
            host_error!(
                self.console,
                Syscall::Remove.name(),
                " succeeded on a file that should not exist"
            );
            return Err(Failure::Unexpected(Syscall::Remove));
        }
        self.expect_errno(FileIOErrno::NoSuchEntity)?;

        self.trying(Syscall::Open, display(missing));
        let fd = host.open(missing, OpenMode::Read);
        if fd > 0 {
            host_error!(
                self.console,
                Syscall::Open.name(),
                " succeeded on a file that should not exist"
            );
            return Err(self.abandon(fd, Failure::Unexpected(Syscall::Open)));
        }
        self.expect_errno(FileIOErrno::NoSuchEntity)
    }

    fn timing(&mut self) -> TestResult {
        let host = self.host();
        let expected_cs = (CLOCK_WAIT_MS / 10) as i32;

        self.trying(Syscall::Clock, "a one second wait");
        let start = host.clock();
        if start < 0 {
            return Err(self.failed(Syscall::Clock));
        }
        self.timer.wait(CLOCK_WAIT_MS);
        let elapsed = host.clock().wrapping_sub(start);
        if elapsed.abs_diff(expected_cs) > self.profile.clock_tolerance_cs.unsigned_abs() {
            host_error!(
                self.console,
                Syscall::Clock.name(),
                " advanced ",
                elapsed,
                " centiseconds, expected ",
                expected_cs
            );
            return Err(Failure::Unexpected(Syscall::Clock));
        }
        self.succeeded(Syscall::Clock);

        self.trying(Syscall::Time, "a two second wait");
        let start = host.time();
        if start == 0 {
            return Err(self.failed(Syscall::Time));
        }
        self.timer.wait(TIME_WAIT_MS);
        let advance = host.time().wrapping_sub(start);
        let (least, most) = self.profile.time_advance_s;
        if !(least..=most).contains(&advance) {
            host_error!(self.console, Syscall::Time.name(), " advanced ", advance, " seconds");
            return Err(Failure::Unexpected(Syscall::Time));
        }
        self.succeeded(Syscall::Time);
        Ok(())
    }

    /// The reference host implements neither call, so both must fail.
    fn intervals(&mut self) -> TestResult {
        let host = self.host();

        self.trying(Syscall::ElapsedTime, "the host");
        let mut ticks = 0u64;
        let result = host.elapsed_time(&mut ticks);
        if result.is_success() || ticks != 0 {
            host_error!(
                self.console,
                Syscall::ElapsedTime.name(),
                " returned ",
                result,
                " with ",
                ticks,
                " ticks, expected it to be unsupported"
            );
            return Err(Failure::Unexpected(Syscall::ElapsedTime));
        }
        host_notice!(self.console, Syscall::ElapsedTime.name(), " unsupported as expected");

        self.trying(Syscall::TickFrequency, "the host");
        let frequency = host.tick_frequency();
        if frequency != -1 {
            host_error!(self.console, Syscall::TickFrequency.name(), " returned ", frequency);
            return Err(Failure::Unexpected(Syscall::TickFrequency));
        }
        host_notice!(self.console, Syscall::TickFrequency.name(), " unsupported as expected");
        Ok(())
    }

    fn heap_info(&mut self) -> TestResult {
        self.trying(Syscall::HeapInfo, "the host");
        let mut block = HEAP_SENTINEL;
        self.host().heap_info(&mut block);
        if block == HEAP_SENTINEL {
            host_error!(self.console, Syscall::HeapInfo.name(), " left the block untouched");
            return Err(Failure::Unexpected(Syscall::HeapInfo));
        }
        host_info!(
            self.console,
            "Heap ",
            block.heap_base,
            " to ",
            block.heap_limit,
            ", stack ",
            block.stack_base,
            " to ",
            block.stack_limit
        );
        self.succeeded(Syscall::HeapInfo);
        Ok(())
    }

    /// r0 is undefined after both calls, so this only checks they come back.
    fn character_output(&mut self) -> TestResult {
        let host = self.host();
        self.trying(Syscall::WriteChar, "the debug channel");
        for &chr in b"SYS_WRITEC output\n" {
            let _ = host.write_char(chr);
        }
        self.trying(Syscall::WriteNulString, "the debug channel");
        let _ = host.write0(c"SYS_WRITE0 output\n");
        host_notice!(self.console, "Character output issued");
        Ok(())
    }
}

/// How a whole run ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// The console never opened, so nothing could be reported.
    ConsoleUnavailable(ConsoleError),
    Passed,
    Failed(Failure),
    /// The console could not be shut down after the tests.
    CloseFailed { passed: bool },
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }

    /// Status for `SYS_EXIT_EXTENDED`.
    pub fn status_code(&self) -> usize {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// Opens the console, runs the suite, reports the result and closes the
/// console again.
pub fn run<T: Trap, M: IntervalTimer>(
    host: &Semihosting<T>,
    timer: &mut M,
    config: &SuiteConfig,
) -> RunOutcome {
    let mut console = Console::new(host, config.console);
    if let Err(error) = console.open() {
        warn!("no host console: {}", error);
        return RunOutcome::ConsoleUnavailable(error);
    }

    host_notice!(console, "Testing semihosting support");
    let result = Suite::new(&mut console, timer, config.host).run_tests();
    match result {
        Ok(()) => host_notice!(console, "Test complete (success)"),
        Err(failure) => {
            let mut reason = String::<64>::new();
            let _ = write!(reason, "{}", failure);
            host_error!(console, "Test failed: ", reason.as_str());
        }
    }

    if let Err(error) = console.close() {
        // The input side closes first, so the output is normally still usable.
        host_error!(console, "Failed to shut down host console interface");
        warn!("console close failed: {}", error);
        return RunOutcome::CloseFailed {
            passed: result.is_ok(),
        };
    }

    let outcome = match result {
        Ok(()) => RunOutcome::Passed,
        Err(failure) => RunOutcome::Failed(failure),
    };
    info!("semihosting suite finished: {:?}", outcome);
    outcome
}
