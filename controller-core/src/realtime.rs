//! Shared live-input slot for realtime mode.
//!
//! The command link writes action lines into the slot; the profile's
//! output task reads them. While realtime mode is on, a line that was not
//! refreshed for the idle timeout decays to neutral once.

use alloc::string::String;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};

/// Line presented after the idle timeout. Encodes as neutral.
pub const IDLE_LINE: &str = "clear";

#[derive(Debug)]
struct SlotState {
    line: String,
    set_at: Option<Instant>,
    active: bool,
    dirty: bool,
    decayed: bool,
}

impl SlotState {
    const fn new() -> Self {
        Self {
            line: String::new(),
            set_at: None,
            active: false,
            dirty: false,
            decayed: false,
        }
    }

    fn decay(&mut self, now: Instant, idle: Duration) {
        if !self.active || self.decayed {
            return;
        }
        let Some(set_at) = self.set_at else {
            return;
        };
        if now.saturating_duration_since(set_at) > idle {
            debug!("realtime input idle, releasing");
            self.decayed = true;
            self.dirty = true;
        }
    }

    fn current(&self) -> &str {
        if self.decayed {
            IDLE_LINE
        } else {
            &self.line
        }
    }
}

/// The pending action line plus realtime on/off state.
pub struct RealtimeSlot<M: RawMutex> {
    state: BlockingMutex<M, RefCell<SlotState>>,
    started: Signal<M, ()>,
}

impl<M: RawMutex> RealtimeSlot<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: BlockingMutex::new(RefCell::new(SlotState::new())),
            started: Signal::new(),
        }
    }

    /// Enter realtime mode with a neutral line.
    pub fn start(&self, now: Instant) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.line.clear();
            s.set_at = Some(now);
            s.active = true;
            s.dirty = true;
            s.decayed = false;
        });
        self.started.signal(());
    }

    pub fn stop(&self) {
        self.state.lock(|s| s.borrow_mut().active = false);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock(|s| s.borrow().active)
    }

    /// Replace the pending line.
    pub fn set(&self, line: &str, now: Instant) {
        let line = line.trim();
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.decayed || s.line != line {
                s.dirty = true;
            }
            if s.line != line {
                s.line.clear();
                s.line.push_str(line);
            }
            s.set_at = Some(now);
            s.decayed = false;
        });
    }

    /// Take the current line if it changed since the last poll.
    pub fn poll(&self, now: Instant, idle: Duration) -> Option<String> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.decay(now, idle);
            if !s.dirty {
                return None;
            }
            s.dirty = false;
            Some(String::from(s.current()))
        })
    }

    /// Read the current line in place.
    pub fn map_current<R>(&self, now: Instant, idle: Duration, f: impl FnOnce(&str) -> R) -> R {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.decay(now, idle);
            f(s.current())
        })
    }

    /// Wait for the next [`start`](Self::start).
    pub async fn wait_started(&self) {
        self.started.wait().await;
    }
}

impl<M: RawMutex> Default for RealtimeSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    const IDLE: Duration = Duration::from_secs(2);

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_poll_reports_changes_once() {
        let slot = RealtimeSlot::<NoopRawMutex>::new();
        slot.start(at(0));
        assert_eq!(slot.poll(at(0), IDLE), Some(String::new()));
        assert_eq!(slot.poll(at(3), IDLE), None);

        slot.set(" A|B ", at(10));
        assert_eq!(slot.poll(at(12), IDLE), Some("A|B".to_string()));
        slot.set("A|B", at(20));
        assert_eq!(slot.poll(at(22), IDLE), None);
    }

    #[test]
    fn test_idle_decays_to_neutral_once() {
        let slot = RealtimeSlot::<NoopRawMutex>::new();
        slot.start(at(0));
        slot.set("A", at(100));
        assert_eq!(slot.poll(at(103), IDLE).as_deref(), Some("A"));
        assert_eq!(slot.poll(at(2_100), IDLE), None);
        assert_eq!(slot.poll(at(2_101), IDLE).as_deref(), Some(IDLE_LINE));
        assert_eq!(slot.poll(at(9_000), IDLE), None);

        // Same line again after decay is a change.
        slot.set("A", at(9_001));
        assert_eq!(slot.poll(at(9_002), IDLE).as_deref(), Some("A"));
    }

    #[test]
    fn test_no_decay_outside_realtime() {
        let slot = RealtimeSlot::<NoopRawMutex>::new();
        slot.set("A", at(0));
        let line = slot.map_current(at(60_000), IDLE, |l| l.to_string());
        assert_eq!(line, "A");
        assert!(!slot.is_active());
    }

    #[test]
    fn test_start_clears_and_stop_keeps_line() {
        let slot = RealtimeSlot::<NoopRawMutex>::new();
        slot.set("B", at(0));
        slot.start(at(5));
        assert!(slot.is_active());
        assert_eq!(slot.map_current(at(5), IDLE, str::len), 0);
        slot.set("X", at(6));
        slot.stop();
        assert!(!slot.is_active());
        assert!(slot.map_current(at(10_000), IDLE, |l| l == "X"));
    }
}
