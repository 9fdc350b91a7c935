//! Cost accounting and wasm/host time partitioning.

use std::time::{Duration, Instant};

#[derive(Default)]
struct TimeSlot {
    total: Duration,
    started: Option<Instant>,
}

impl TimeSlot {
    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(at) = self.started.take() {
            self.total += at.elapsed();
        }
    }
}

/// Metering collector: charges execution cost against a limit and splits
/// wall time into wasm-time and host-time.
///
/// Charging precedes the call it meters, so a refusal leaves no partial
/// state behind. The two timers are toggled in pairs around host calls;
/// at most one runs at any instant.
pub struct Meter {
    limit: u64,
    consumed: u64,
    wasm: TimeSlot,
    host: TimeSlot,
}

impl Meter {
    pub fn new(limit: u64) -> Self {
        Meter {
            limit,
            consumed: 0,
            wasm: TimeSlot::default(),
            host: TimeSlot::default(),
        }
    }

    /// Charge `cost`, refusing on overflow of the limit.
    pub fn charge(&mut self, cost: u64) -> bool {
        match self.consumed.checked_add(cost) {
            Some(total) if total <= self.limit => {
                self.consumed = total;
                true
            }
            _ => false,
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn start_wasm(&mut self) {
        self.wasm.start();
    }

    pub fn stop_wasm(&mut self) {
        self.wasm.stop();
    }

    pub fn start_host(&mut self) {
        self.host.start();
    }

    pub fn stop_host(&mut self) {
        self.host.stop();
    }

    pub fn wasm_time(&self) -> Duration {
        self.wasm.total
    }

    pub fn host_time(&self) -> Duration {
        self.host.total
    }
}
