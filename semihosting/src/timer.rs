//! The hardware timer the timing tests measure the host's clocks against.

/// A one-shot millisecond timer that is polled rather than interrupt driven.
pub trait IntervalTimer {
    /// Arms the timer to expire `millis` milliseconds from now.
    fn start(&mut self, millis: u32);

    /// Whether the armed interval has run out.
    fn expired(&mut self) -> bool;

    /// Busy-waits for `millis` milliseconds.
    fn wait(&mut self, millis: u32) {
        self.start(millis);
        while !self.expired() {
            continue;
        }
    }
}
