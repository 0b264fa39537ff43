//! ARM semihosting for debug probe validation.
//!
//! * [`syscalls`] wraps every semihosting operation behind a [`Trap`], the one
//!   point where the target actually stops and asks the debug host for service.
//! * [`console`] is a leveled, colored line writer on the host's `:tt` device.
//! * [`suite`] is a fixed sequence of tests that checks a debug host answers
//!   each operation the way the reference host does.
//! * [`logger`] is a `log` backend that writes through `SYS_WRITE0`.
//!
//! The crate is `no_std`; firmware supplies the trap and an [`IntervalTimer`],
//! the unit tests supply a simulated host.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod console;
pub mod logger;
pub mod suite;
pub mod syscalls;
pub mod timer;
pub mod trap;
pub mod types;

#[cfg(test)]
mod mock;

pub use config::{ConsoleConfig, HostProfile, LineEnding, SuiteConfig, REFERENCE_HOST};
pub use console::{Console, ConsoleError, Level};
pub use logger::HostLogger;
pub use suite::{run, Failure, RunOutcome};
pub use syscalls::Semihosting;
pub use timer::IntervalTimer;
pub use trap::Trap;
pub use types::{ExitReason, FileIOErrno, HeapInfoBlock, OpenMode, SemihostingResult, Syscall};
