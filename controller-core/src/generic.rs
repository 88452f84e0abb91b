//! Generic HID joystick profile (HORIPAD S).
//!
//! Every input change is one 8-byte report. Realtime mode runs a polling
//! loop that forwards the live line whenever it changes.

use core::cell::Cell;

use controller_proto::{encode_generic, InputState};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Instant;
use macro_engine::CommandError;

use crate::cancel::{Cancel, NeverCancel};
use crate::clock::Clock;
use crate::config::Timing;
use crate::controller::{Controller, Report};
use crate::error::RunError;
use crate::pacer::{wait_until, ReportPacer};
use crate::realtime::RealtimeSlot;
use crate::sink::{send_with_retry, ReportSink};

pub struct GenericController<M: RawMutex, S, C> {
    sink: Mutex<M, S>,
    pacer: BlockingMutex<M, Cell<ReportPacer>>,
    slot: RealtimeSlot<M>,
    clock: C,
    timing: Timing,
}

impl<M: RawMutex, S: ReportSink, C: Clock> GenericController<M, S, C> {
    pub fn new(sink: S, clock: C, timing: Timing) -> Self {
        Self {
            sink: Mutex::new(sink),
            pacer: BlockingMutex::new(Cell::new(ReportPacer::new(timing.min_send_interval()))),
            slot: RealtimeSlot::new(),
            clock,
            timing,
        }
    }

    /// Serve realtime sessions forever.
    pub async fn run_realtime(&self) -> ! {
        loop {
            self.realtime_session().await;
        }
    }

    /// Wait for realtime mode, forward live input until it ends, then
    /// release.
    pub async fn realtime_session(&self) {
        self.slot.wait_started().await;
        info!("realtime mode on");

        let tick = self.timing.realtime_tick();
        let mut next = self.clock.now();
        while self.slot.is_active() {
            if let Some(line) = self.slot.poll(self.clock.now(), self.timing.realtime_idle()) {
                if let Err(e) = self.send(&line, None, &NeverCancel).await {
                    warn!("realtime send failed: {}", e);
                }
            }
            next = (next + tick).max(self.clock.now());
            self.clock.sleep_until(next).await;
        }

        if let Err(e) = self.release().await {
            warn!("realtime release failed: {}", e);
        }
        info!("realtime mode off");
    }
}

impl<M: RawMutex, S: ReportSink, C: Clock> Controller for GenericController<M, S, C> {
    type Clock = C;

    fn clock(&self) -> &C {
        &self.clock
    }

    fn encode(&self, line: &str) -> Report {
        let report = encode_generic(&InputState::from_action_line(line));
        // 8 bytes always fit.
        Report::from_slice(&report).unwrap_or_default()
    }

    async fn send<X: Cancel>(
        &self,
        line: &str,
        not_before: Option<Instant>,
        cancel: &X,
    ) -> Result<Instant, RunError> {
        let report = encode_generic(&InputState::from_action_line(line));
        let mut sink = self.sink.lock().await;

        let deadline = self.pacer.lock(|p| p.get().deadline(not_before));
        wait_until(&self.clock, deadline, cancel).await?;

        send_with_retry(&mut *sink, &report).await?;
        let at = self.clock.now();
        self.pacer.lock(|p| {
            let mut pacer = p.get();
            pacer.record(at);
            p.set(pacer);
        });
        Ok(at)
    }

    fn start_realtime(&self) {
        self.slot.start(self.clock.now());
    }

    fn stop_realtime(&self) {
        self.slot.stop();
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
}
