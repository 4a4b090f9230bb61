use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const SECOND_MS: u32 = 1000;

/// Millisecond tick counter shared between the timer task and the main loop.
///
/// The timer side only raises flags and counts elapsed seconds; the main loop
/// consumes them with the `take_*` methods. Period phases are kept separately
/// from the free running counter, so its wrap does not shorten a period.
pub struct Ticks {
    count: AtomicU32,
    heartbeat_period_ms: u32,
    heartbeat_phase: AtomicU32,
    heartbeat_due: AtomicBool,
    second_phase: AtomicU32,
    seconds: AtomicU32,
}

impl Ticks {
    pub const fn new(heartbeat_period_ms: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            heartbeat_period_ms,
            heartbeat_phase: AtomicU32::new(0),
            heartbeat_due: AtomicBool::new(false),
            second_phase: AtomicU32::new(0),
            seconds: AtomicU32::new(0),
        }
    }

    /// Called once per millisecond
    pub fn on_tick(&self) {
        if advance(&self.second_phase, SECOND_MS) {
            self.seconds.fetch_add(1, Ordering::Release);
        }
        if self.heartbeat_period_ms != 0 && advance(&self.heartbeat_phase, self.heartbeat_period_ms)
        {
            self.heartbeat_due.store(true, Ordering::Release);
        }
        let t = self.count.load(Ordering::Relaxed);
        self.count.store(t.wrapping_add(1), Ordering::Relaxed);
    }

    /// Milliseconds since start, wrapping
    pub fn now_ms(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn take_heartbeat_due(&self) -> bool {
        self.heartbeat_due.swap(false, Ordering::Acquire)
    }

    /// Whole seconds elapsed since the last call
    pub fn take_seconds(&self) -> u32 {
        self.seconds.swap(0, Ordering::Acquire)
    }

    #[cfg(test)]
    fn starting_at(heartbeat_period_ms: u32, count: u32) -> Self {
        let ticks = Self::new(heartbeat_period_ms);
        ticks.count.store(count, Ordering::Relaxed);
        ticks
    }
}

/// Step a phase counter; true when it was at the start of its period
fn advance(phase: &AtomicU32, period: u32) -> bool {
    let p = phase.load(Ordering::Relaxed);
    let next = p + 1;
    phase.store(if next >= period { 0 } else { next }, Ordering::Relaxed);
    p == 0
}
