//! Semihosting validation firmware for the Black Magic Probe.
//!
//! Runs the semihosting test suite once against whatever debug host is
//! attached, then idles (or exits through the host with the
//! `exit-on-complete` feature). Built for an STM32F411 running from its
//! 16 MHz internal oscillator.

#![no_std]
#![no_main]

use cortex_m::asm;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use cortex_m_rt::entry;
use log::{debug, info, LevelFilter};
use panic_halt as _;
use probe_semihosting::{
    ConsoleConfig, ExitReason, HostLogger, IntervalTimer, LineEnding, Semihosting, SuiteConfig,
    Syscall, Trap, REFERENCE_HOST,
};

const CORE_CLOCK_HZ: u32 = 16_000_000;

/// `bkpt 0xAB`.
struct Bkpt;

impl Trap for Bkpt {
    unsafe fn syscall(&self, op: Syscall, param: usize) -> i32 {
        // SAFETY: the caller guarantees `param` matches `op`.
        unsafe { cortex_m_semihosting::syscall1(op as usize, param) as i32 }
    }
}

const LOG_LEVEL: LevelFilter = if cfg!(feature = "verbose") {
    LevelFilter::Trace
} else {
    LevelFilter::Warn
};

static LOGGER: HostLogger<Bkpt> = HostLogger::new(Semihosting::new(Bkpt), LOG_LEVEL);

const CONFIG: SuiteConfig = SuiteConfig {
    console: ConsoleConfig {
        line_ending: if cfg!(feature = "crlf") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        },
    },
    host: REFERENCE_HOST,
};

/// Millisecond timer on SysTick, counting wraps of a 1 ms reload.
struct SysTickTimer {
    syst: SYST,
    remaining: u32,
}

impl SysTickTimer {
    fn new(mut syst: SYST) -> Self {
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(CORE_CLOCK_HZ / 1000 - 1);
        syst.clear_current();
        syst.enable_counter();
        Self { syst, remaining: 0 }
    }
}

impl IntervalTimer for SysTickTimer {
    fn start(&mut self, millis: u32) {
        // Writing the current value also clears the wrap flag.
        self.syst.clear_current();
        self.remaining = millis;
    }

    fn expired(&mut self) -> bool {
        if self.remaining > 0 && self.syst.has_wrapped() {
            self.remaining -= 1;
        }
        self.remaining == 0
    }
}

fn idle() -> ! {
    loop {
        asm::wfi();
    }
}

#[entry]
fn main() -> ! {
    // Only fails if a logger is already installed.
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(LOGGER.level()));

    let Some(peripherals) = cortex_m::Peripherals::take() else {
        idle()
    };
    let mut timer = SysTickTimer::new(peripherals.SYST);
    debug!("SysTick running at {} Hz", CORE_CLOCK_HZ);

    let host = Semihosting::new(Bkpt);
    let outcome = probe_semihosting::run(&host, &mut timer, &CONFIG);
    info!("outcome: {:?}", outcome);

    if cfg!(feature = "exit-on-complete") {
        host.exit_extended(ExitReason::ApplicationExit, outcome.status_code());
    }
    idle()
}
