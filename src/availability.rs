/// Number of consecutive failed polls tolerated before the device is reported unavailable.
pub const THRESHOLD: u32 = 30;

/// Tracks consecutive poll failures for a device.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    failures: u32,
}

impl Availability {
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn is_available(&self) -> bool {
        self.failures <= THRESHOLD
    }
}
