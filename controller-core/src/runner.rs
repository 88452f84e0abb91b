//! Macro runner: one run at a time, fed through a bounded request queue.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use macro_engine::{ActionCursor, CommandError, ScriptStore, StartRequest};
use portable_atomic::{AtomicBool, Ordering};

use crate::cancel::{Cancel, CancelToken};
use crate::chain::do_action;
use crate::controller::Controller;
use crate::error::RunError;

/// Start requests that may wait behind the current run.
pub const REQUEST_QUEUE_DEPTH: usize = 4;

/// Shared between the command link (producer) and the runner (consumer).
pub struct RunControl<M: RawMutex> {
    requests: Channel<M, StartRequest, REQUEST_QUEUE_DEPTH>,
    cancel: CancelToken<M>,
    running: AtomicBool,
}

impl<M: RawMutex> RunControl<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            cancel: CancelToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Queue a run. Fails with [`CommandError::Busy`] when the queue is full.
    pub fn submit(&self, request: StartRequest) -> Result<(), CommandError> {
        self.requests
            .try_send(request)
            .map_err(|_| CommandError::Busy)
    }

    /// Cancel the current run, if any.
    pub fn cancel_current(&self) {
        if self.is_running() {
            self.cancel.cancel();
        }
    }

    /// Cancel the current run and drop every queued request.
    pub fn stop_all(&self) {
        self.cancel.cancel();
        while self.requests.try_receive().is_ok() {}
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wait for the next queued request.
    pub async fn next_request(&self) -> StartRequest {
        self.requests.receive().await
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.requests.len()
    }
}

impl<M: RawMutex> Default for RunControl<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunOutcome {
    /// All requested cycles played, or the macro ran dry.
    Completed { cycles: u32 },
    /// Stopped by a command.
    Cancelled { cycles: u32 },
    Failed(RunError),
}

/// Plays queued macros on one controller.
pub struct MacroRunner<'a, M: RawMutex, C> {
    store: &'a ScriptStore,
    controller: &'a C,
    control: &'a RunControl<M>,
}

impl<'a, M: RawMutex, C: Controller> MacroRunner<'a, M, C> {
    pub fn new(store: &'a ScriptStore, controller: &'a C, control: &'a RunControl<M>) -> Self {
        Self {
            store,
            controller,
            control,
        }
    }

    /// Serve requests forever.
    pub async fn run(&self) -> ! {
        loop {
            let request = self.control.next_request().await;
            self.control.cancel.reset();
            self.execute(&request).await;
        }
    }

    /// Play one request to completion or cancellation. The controller is
    /// always released afterwards.
    pub async fn execute(&self, request: &StartRequest) -> RunOutcome {
        let Some(mut cursor) =
            ActionCursor::with_overrides(self.store, &request.name, &request.overrides)
        else {
            warn!("unknown macro {}", request.name.as_str());
            return RunOutcome::Failed(RunError::UnknownMacro);
        };

        self.control.running.store(true, Ordering::Release);
        info!(
            "macro {} started, loop {}",
            request.name.as_str(),
            request.loop_count
        );

        let (cycles, result) = self.drive(&mut cursor, request.loop_count).await;

        if let Err(e) = self.controller.release().await {
            warn!("release failed: {}", e);
        }
        self.control.running.store(false, Ordering::Release);

        let outcome = match result {
            Ok(()) => RunOutcome::Completed { cycles },
            Err(RunError::Cancelled) => RunOutcome::Cancelled { cycles },
            Err(e) => RunOutcome::Failed(e),
        };
        match outcome {
            RunOutcome::Completed { cycles } => {
                info!("macro {} finished after {} cycles", request.name.as_str(), cycles);
            }
            RunOutcome::Cancelled { cycles } => {
                info!("macro {} stopped after {} cycles", request.name.as_str(), cycles);
            }
            RunOutcome::Failed(e) => warn!("macro {} failed: {}", request.name.as_str(), e),
        }
        outcome
    }

    async fn drive(&self, cursor: &mut ActionCursor<'a>, loop_count: i64) -> (u32, Result<(), RunError>) {
        let cancel = &self.control.cancel;
        let mut cycles: u32 = 0;
        let mut produced = false;
        loop {
            if cancel.is_cancelled() {
                return (cycles, Err(RunError::Cancelled));
            }
            match cursor.pop() {
                (Some(line), _) => {
                    produced = true;
                    if let Err(e) = do_action(self.controller, line, cancel).await {
                        return (cycles, Err(e));
                    }
                }
                (None, _) => {
                    cycles = cycles.saturating_add(1);
                    if loop_count > 0 && i64::from(cycles) >= loop_count {
                        return (cycles, Ok(()));
                    }
                    if !produced {
                        debug!("macro cycle produced no input, ending run");
                        return (cycles, Ok(()));
                    }
                    produced = false;
                    cursor.cycle_reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LineRecorder, MockClock};
    use alloc::boxed::Box;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type Control = RunControl<NoopRawMutex>;

    fn store(files: &[(&str, &str)]) -> ScriptStore {
        ScriptStore::load(files)
    }

    fn leaked_control() -> &'static Control {
        Box::leak(Box::new(Control::new()))
    }

    /// Lines actually pressed, with the release sends filtered out.
    fn pressed(ctrl: &LineRecorder) -> Vec<String> {
        ctrl.lines().into_iter().filter(|l| !l.is_empty()).collect()
    }

    #[test]
    fn test_self_jump_plays_three_times() {
        let store = store(&[("t.m", "<t>\nA:0.1\n[t]*2\n")]);
        let clock = MockClock::new();
        let ctrl = LineRecorder::new(&clock);
        let control = Control::new();
        let runner = MacroRunner::new(&store, &ctrl, &control);

        let outcome = block_on(runner.execute(&StartRequest::new("t.t", 1)));
        assert_eq!(outcome, RunOutcome::Completed { cycles: 1 });
        assert_eq!(pressed(&ctrl), ["A", "A", "A"]);
        assert_eq!(ctrl.lines().last().map(String::as_str), Some(""));
        assert!(!control.is_running());
    }

    #[test]
    fn test_loop_count_repeats_body() {
        let store = store(&[("m.m", "<intro>\nHOME\nbody:\nA:0.05\nB:0.05\n")]);
        let clock = MockClock::new();
        let ctrl = LineRecorder::new(&clock);
        let control = Control::new();
        let runner = MacroRunner::new(&store, &ctrl, &control);

        let outcome = block_on(runner.execute(&StartRequest::new("m.intro", 3)));
        assert_eq!(outcome, RunOutcome::Completed { cycles: 3 });
        assert_eq!(pressed(&ctrl), ["HOME", "A", "B", "A", "B", "A", "B"]);
    }

    #[test]
    fn test_overrides_reach_conditions() {
        let store = store(&[(
            "c.m",
            "<x>\nDEFAULT>fast=false\n[c.slow]?!fast\nA\n<slow>\nB\n",
        )]);
        let clock = MockClock::new();
        let ctrl = LineRecorder::new(&clock);
        let control = Control::new();
        let runner = MacroRunner::new(&store, &ctrl, &control);

        let mut request = StartRequest::new("c.x", 1);
        request
            .overrides
            .insert(String::from("fast"), serde_json::Value::Bool(true));
        block_on(runner.execute(&request));
        assert_eq!(pressed(&ctrl), ["A"]);

        let ctrl = LineRecorder::new(&clock);
        let runner = MacroRunner::new(&store, &ctrl, &control);
        block_on(runner.execute(&StartRequest::new("c.x", 1)));
        assert_eq!(pressed(&ctrl), ["B", "A"]);
    }

    #[test]
    fn test_unknown_macro_fails_without_output() {
        let store = store(&[]);
        let clock = MockClock::new();
        let ctrl = LineRecorder::new(&clock);
        let control = Control::new();
        let runner = MacroRunner::new(&store, &ctrl, &control);
        assert_eq!(
            block_on(runner.execute(&StartRequest::new("nope", 1))),
            RunOutcome::Failed(RunError::UnknownMacro)
        );
        assert!(ctrl.lines().is_empty());
    }

    #[test]
    fn test_endless_run_stops_on_cancel_and_releases() {
        let store = store(&[("e.m", "<spin>\nA:1\n")]);
        let clock = MockClock::new();
        let control = leaked_control();
        let ctrl = LineRecorder::new(&clock).on_send(move |line, _| {
            if line == "A" && control.is_running() {
                // Stop arrives while the first press is held.
                control.stop_all();
            }
        });
        let runner = MacroRunner::new(&store, &ctrl, control);

        let outcome = block_on(runner.execute(&StartRequest::new("e.spin", 0)));
        assert_eq!(outcome, RunOutcome::Cancelled { cycles: 0 });
        assert_eq!(ctrl.lines(), ["A", ""]);
        assert!(!control.is_running());
    }

    #[test]
    fn test_endless_run_counts_cycles_until_cancel() {
        let store = store(&[("e.m", "<spin>\nA:0.01\n")]);
        let clock = MockClock::new();
        let control = leaked_control();
        let presses = Cell::new(0);
        let ctrl = LineRecorder::new(&clock).on_send(move |line, _| {
            if line == "A" {
                presses.set(presses.get() + 1);
                if presses.get() == 5 {
                    control.cancel_current();
                }
            }
        });
        let runner = MacroRunner::new(&store, &ctrl, control);

        let outcome = block_on(runner.execute(&StartRequest::new("e.spin", -1)));
        assert_eq!(outcome, RunOutcome::Cancelled { cycles: 4 });
        assert_eq!(pressed(&ctrl).len(), 5);
    }

    #[test]
    fn test_empty_cycle_ends_endless_run() {
        let store = store(&[("d.m", "<x>\nA\nbody:\nEXEC>n=1\n")]);
        let clock = MockClock::new();
        let ctrl = LineRecorder::new(&clock);
        let control = Control::new();
        let runner = MacroRunner::new(&store, &ctrl, &control);
        let outcome = block_on(runner.execute(&StartRequest::new("d.x", 0)));
        assert_eq!(outcome, RunOutcome::Completed { cycles: 2 });
        assert_eq!(pressed(&ctrl), ["A"]);
    }

    #[test]
    fn test_queue_is_bounded_and_stop_drains_it() {
        let control = Control::new();
        for i in 0..REQUEST_QUEUE_DEPTH {
            control.submit(StartRequest::new(alloc::format!("m{i}"), 1)).unwrap();
        }
        assert_eq!(
            control.submit(StartRequest::new("extra", 1)),
            Err(CommandError::Busy)
        );
        control.stop_all();
        assert_eq!(control.pending(), 0);
    }
}
