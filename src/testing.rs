//! Deterministic stand-ins for the modem, its clock and its power pin.

use alloc::{rc::Rc, vec::Vec};
use core::cell::{Cell, RefCell};

use crate::modem::Transport;

/// Milliseconds of simulated time, shared between a delay and a transport
#[derive(Clone, Default)]
pub struct FakeClock(Rc<Cell<u64>>);

impl FakeClock {
    pub fn now_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }

    fn advance_ns(&self, ns: u64) {
        self.0.set(self.0.get() + ns);
    }
}

pub struct FakeDelay {
    clock: FakeClock,
}

impl FakeDelay {
    pub fn new(clock: FakeClock) -> Self {
        Self { clock }
    }
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(ns as u64);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ns(ms as u64 * 1_000_000);
    }
}

struct Arrival {
    at_ms: u64,
    bytes: Vec<u8>,
}

/// Reply rule: any write starting with `command` schedules `reply`
struct Rule {
    command: &'static [u8],
    reply: &'static [u8],
    latency_ms: u64,
}

impl Rule {
    fn matches(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(self.command)
    }

    fn arrival(&self, now: u64) -> Arrival {
        Arrival {
            at_ms: now + self.latency_ms,
            bytes: self.reply.to_vec(),
        }
    }
}

#[derive(Default)]
struct Script {
    pending: Vec<Arrival>,
    /// First match wins
    rules: Vec<Rule>,
    /// Every match fires, on top of the reply rule
    follow_ups: Vec<Rule>,
    writes: Vec<Vec<u8>>,
}

/// Transport that delivers bytes at fixed simulated times and answers known commands
#[derive(Clone)]
pub struct ScriptedTransport {
    clock: FakeClock,
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            script: Default::default(),
        }
    }

    /// Make `bytes` readable once the clock reaches `at_ms`
    pub fn arrive_at(&self, at_ms: u64, bytes: &[u8]) {
        self.script.borrow_mut().pending.push(Arrival {
            at_ms,
            bytes: bytes.to_vec(),
        });
    }

    pub fn reply(&self, command: &'static str, reply: &'static str) {
        self.reply_after(command, reply, 5);
    }

    pub fn reply_after(&self, command: &'static str, reply: &'static str, latency_ms: u64) {
        self.script.borrow_mut().rules.push(Rule {
            command: command.as_bytes(),
            reply: reply.as_bytes(),
            latency_ms,
        });
    }

    /// Additional unsolicited data `latency_ms` after every write starting with `command`
    pub fn follow_up(&self, command: &'static str, data: &'static str, latency_ms: u64) {
        self.script.borrow_mut().follow_ups.push(Rule {
            command: command.as_bytes(),
            reply: data.as_bytes(),
            latency_ms,
        });
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.script.borrow().writes.clone()
    }

    pub fn count_writes(&self, prefix: &str) -> usize {
        self.script
            .borrow()
            .writes
            .iter()
            .filter(|w| w.starts_with(prefix.as_bytes()))
            .count()
    }
}

impl Transport for ScriptedTransport {
    type Error = core::convert::Infallible;

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let now = self.clock.now_ms();
        let mut script = self.script.borrow_mut();
        script.writes.push(bytes.to_vec());
        let mut arrivals: Vec<Arrival> = script
            .rules
            .iter()
            .find(|rule| rule.matches(bytes))
            .map(|rule| rule.arrival(now))
            .into_iter()
            .collect();
        arrivals.extend(
            script
                .follow_ups
                .iter()
                .filter(|rule| rule.matches(bytes))
                .map(|rule| rule.arrival(now)),
        );
        script.pending.extend(arrivals);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let now = self.clock.now_ms();
        let mut script = self.script.borrow_mut();
        let mut n = 0;
        for arrival in script.pending.iter_mut().filter(|a| a.at_ms <= now) {
            let take = arrival.bytes.len().min(buf.len() - n);
            buf[n..n + take].copy_from_slice(&arrival.bytes[..take]);
            arrival.bytes.drain(..take);
            n += take;
            if n == buf.len() {
                break;
            }
        }
        script.pending.retain(|a| !a.bytes.is_empty());
        n
    }
}

/// Power pin that remembers every level it was driven to
#[derive(Clone, Default)]
pub struct RecordingPin(Rc<RefCell<Vec<bool>>>);

impl RecordingPin {
    pub fn levels(&self) -> Vec<bool> {
        self.0.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(true);
        Ok(())
    }
}
