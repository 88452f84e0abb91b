//! Pro Controller profile.
//!
//! Input changes only update the pending line. A periodic task stamps it
//! into a `0x30` report every tick while the host is connected, and the
//! inbound task answers the host's handshake and subcommands.

use core::cell::{Cell, RefCell};

use controller_proto::{encode_pro, InputState, ProtocolEmulator};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Instant;
use macro_engine::CommandError;

use crate::cancel::Cancel;
use crate::clock::Clock;
use crate::config::Timing;
use crate::controller::{Controller, Report};
use crate::error::RunError;
use crate::pacer::{wait_until, ReportPacer};
use crate::realtime::RealtimeSlot;
use crate::sink::{send_with_retry, OutputError, ReportSink};

pub struct ProController<M: RawMutex, S, C> {
    sink: Mutex<M, S>,
    session: BlockingMutex<M, RefCell<ProtocolEmulator>>,
    pacer: BlockingMutex<M, Cell<ReportPacer>>,
    slot: RealtimeSlot<M>,
    clock: C,
    timing: Timing,
}

impl<M: RawMutex, S: ReportSink, C: Clock> ProController<M, S, C> {
    /// New controller; the report counter starts now.
    pub fn new(sink: S, clock: C, timing: Timing) -> Self {
        let session = ProtocolEmulator::new(clock.now());
        Self {
            sink: Mutex::new(sink),
            session: BlockingMutex::new(RefCell::new(session)),
            pacer: BlockingMutex::new(Cell::new(ReportPacer::new(timing.min_send_interval()))),
            slot: RealtimeSlot::new(),
            clock,
            timing,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.lock(|s| s.borrow().is_connected())
    }

    fn current_input(&self, now: Instant) -> InputState {
        self.slot
            .map_current(now, self.timing.realtime_idle(), InputState::from_action_line)
    }

    /// Send one periodic input report. Returns `false` while disconnected.
    pub async fn tick(&self) -> Result<bool, OutputError> {
        let now = self.clock.now();
        let input = self.current_input(now);
        let Some(report) = self.session.lock(|s| s.borrow().periodic_report(&input, now)) else {
            return Ok(false);
        };
        let mut sink = self.sink.lock().await;
        send_with_retry(&mut *sink, &report.as_bytes()).await?;
        Ok(true)
    }

    /// Periodic report loop.
    pub async fn run_periodic(&self) -> ! {
        let tick = self.timing.tick();
        let mut next = self.clock.now();
        loop {
            if let Err(e) = self.tick().await {
                warn!("periodic report failed: {}", e);
            }
            next = (next + tick).max(self.clock.now());
            self.clock.sleep_until(next).await;
        }
    }

    /// Answer one report received from the host (`report[0]` is its id).
    ///
    /// Returns whether a reply was sent.
    pub async fn handle_output_report(&self, report: &[u8]) -> Result<bool, OutputError> {
        let now = self.clock.now();
        let input = self.current_input(now);
        let (was_connected, reply, connected) = self.session.lock(|s| {
            let mut s = s.borrow_mut();
            let was_connected = s.is_connected();
            let reply = s.handle_output_report(report, &input, now);
            (was_connected, reply, s.is_connected())
        });
        if connected != was_connected {
            let event = if connected { "connected" } else { "disconnected" };
            info!("pro controller: host {}", event);
        }
        let Some(reply) = reply else {
            return Ok(false);
        };
        let mut sink = self.sink.lock().await;
        send_with_retry(&mut *sink, &reply.as_bytes()).await?;
        Ok(true)
    }
}

impl<M: RawMutex, S: ReportSink, C: Clock> Controller for ProController<M, S, C> {
    type Clock = C;

    fn clock(&self) -> &C {
        &self.clock
    }

    fn encode(&self, line: &str) -> Report {
        let block = encode_pro(&InputState::from_action_line(line));
        Report::from_slice(&block).unwrap_or_default()
    }

    async fn send<X: Cancel>(
        &self,
        line: &str,
        not_before: Option<Instant>,
        cancel: &X,
    ) -> Result<Instant, RunError> {
        let deadline = self.pacer.lock(|p| p.get().deadline(not_before));
        wait_until(&self.clock, deadline, cancel).await?;

        let at = self.clock.now();
        self.slot.set(line, at);
        self.pacer.lock(|p| {
            let mut pacer = p.get();
            pacer.record(at);
            p.set(pacer);
        });
        Ok(at)
    }

    fn start_realtime(&self) {
        info!("realtime mode on");
        self.slot.start(self.clock.now());
    }

    fn stop_realtime(&self) {
        info!("realtime mode off");
        self.slot.stop();
        self.slot.set("", self.clock.now());
    }

    fn is_realtime(&self) -> bool {
        self.slot.is_active()
    }

    fn set_realtime_action(&self, line: &str) -> Result<(), CommandError> {
        if !self.slot.is_active() {
            return Err(CommandError::RealtimeInactive);
        }
        self.slot.set(line, self.clock.now());
        Ok(())
    }

    fn holds_previous(&self) -> bool {
        true
    }
}
