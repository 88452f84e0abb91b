//! Host test doubles: a manual clock and a recording sink.

extern crate std;

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use std::collections::VecDeque;

use embassy_futures::yield_now;
use embassy_time::{Duration, Instant};

use macro_engine::CommandError;

use crate::cancel::Cancel;
use crate::clock::Clock;
use crate::controller::{Controller, Report};
use crate::error::RunError;
use crate::pacer::{wait_until, ReportPacer};
use crate::sink::{OutputError, ReportSink};

/// Clock whose sleeps complete at once, jumping time to the deadline.
///
/// Each sleep yields once so that joined futures get a turn.
#[derive(Clone)]
pub struct MockClock {
    now: Rc<Cell<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::at(Instant::from_millis(1_000))
    }

    pub fn at(start: Instant) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    async fn sleep_until(&self, deadline: Instant) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
        yield_now().await;
    }
}

#[derive(Default)]
struct SinkLog {
    reports: Vec<(Instant, Vec<u8>)>,
    failures: VecDeque<OutputError>,
    attempts: usize,
}

/// Sink that records every report with the mock time it was sent at.
///
/// Clones share the same log, so a test can keep a handle after moving the
/// sink into a driver.
#[derive(Clone)]
pub struct RecordingSink {
    log: Rc<RefCell<SinkLog>>,
    clock: Option<MockClock>,
    hook: Option<Rc<dyn Fn(usize)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(SinkLog::default())),
            clock: None,
            hook: None,
        }
    }

    pub fn with_clock(clock: &MockClock) -> Self {
        Self {
            clock: Some(clock.clone()),
            ..Self::new()
        }
    }

    /// Fail the next sends with these errors, in order.
    pub fn fail_next(&mut self, errors: &[OutputError]) {
        self.log.borrow_mut().failures.extend(errors.iter().copied());
    }

    /// Run `hook` after every successful send with the number sent so far.
    pub fn on_send(&mut self, hook: impl Fn(usize) + 'static) {
        self.hook = Some(Rc::from(Box::new(hook) as Box<dyn Fn(usize)>));
    }

    pub fn reports(&self) -> Vec<Vec<u8>> {
        self.log.borrow().reports.iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn stamped(&self) -> Vec<(Instant, Vec<u8>)> {
        self.log.borrow().reports.clone()
    }

    pub fn attempts(&self) -> usize {
        self.log.borrow().attempts
    }
}

impl ReportSink for RecordingSink {
    async fn send_report(&mut self, report: &[u8]) -> Result<(), OutputError> {
        let sent = {
            let mut log = self.log.borrow_mut();
            log.attempts += 1;
            if let Some(err) = log.failures.pop_front() {
                return Err(err);
            }
            let at = self.clock.as_ref().map_or(Instant::from_ticks(0), |c| c.now());
            log.reports.push((at, report.to_vec()));
            log.reports.len()
        };
        if let Some(hook) = &self.hook {
            hook(sent);
        }
        Ok(())
    }
}

/// Controller that records each sent line with its effective time.
pub struct LineRecorder {
    clock: MockClock,
    pacer: Cell<ReportPacer>,
    lines: RefCell<Vec<(Instant, String)>>,
    realtime: Cell<bool>,
    holds_previous: bool,
    hook: Option<Box<dyn Fn(&str, usize)>>,
}

impl LineRecorder {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            pacer: Cell::new(ReportPacer::default()),
            lines: RefCell::new(Vec::new()),
            realtime: Cell::new(false),
            holds_previous: false,
            hook: None,
        }
    }

    /// Behave like the Pro profile for `~` chain elements.
    pub fn holding_previous(mut self) -> Self {
        self.holds_previous = true;
        self
    }

    /// Run `hook` after every send with the line and the number sent so far.
    pub fn on_send(mut self, hook: impl Fn(&str, usize) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|(_, l)| l.clone()).collect()
    }

    /// Sent lines with their offset from `start` in milliseconds.
    pub fn timeline(&self, start: Instant) -> Vec<(u64, String)> {
        self.lines
            .borrow()
            .iter()
            .map(|(at, l)| ((*at - start).as_millis(), l.clone()))
            .collect()
    }
}

impl Controller for LineRecorder {
    type Clock = MockClock;

    fn clock(&self) -> &MockClock {
        &self.clock
    }

    fn encode(&self, line: &str) -> Report {
        Report::from_slice(line.as_bytes()).unwrap_or_default()
    }

    async fn send<X: Cancel>(
        &self,
        line: &str,
        not_before: Option<Instant>,
        cancel: &X,
    ) -> Result<Instant, RunError> {
        let mut pacer = self.pacer.get();
        wait_until(&self.clock, pacer.deadline(not_before), cancel).await?;
        let at = self.clock.now();
        pacer.record(at);
        self.pacer.set(pacer);
        let sent = {
            let mut lines = self.lines.borrow_mut();
            lines.push((at, String::from(line)));
            lines.len()
        };
        if let Some(hook) = &self.hook {
            hook(line, sent);
        }
        Ok(at)
    }

    fn start_realtime(&self) {
        self.realtime.set(true);
    }

    fn stop_realtime(&self) {
        self.realtime.set(false);
    }

    fn is_realtime(&self) -> bool {
        self.realtime.get()
    }

    fn set_realtime_action(&self, line: &str) -> Result<(), CommandError> {
        if !self.realtime.get() {
            return Err(CommandError::RealtimeInactive);
        }
        self.lines.borrow_mut().push((self.clock.now(), String::from(line)));
        Ok(())
    }

    fn holds_previous(&self) -> bool {
        self.holds_previous
    }
}
