//! Report pacing: minimum spacing between sends, absolute deadlines.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant};

use crate::cancel::Cancel;
use crate::clock::Clock;
use crate::error::RunError;

/// Default minimum spacing between two sends.
pub const MIN_SEND_INTERVAL: Duration = Duration::from_millis(3);

/// Tracks the last send and derives the earliest next one.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportPacer {
    min_interval: Duration,
    last_send: Option<Instant>,
}

impl ReportPacer {
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: None,
        }
    }

    /// Earliest instant the next send may happen: one interval after the
    /// last send, and not before `not_before`.
    #[must_use]
    pub fn deadline(&self, not_before: Option<Instant>) -> Option<Instant> {
        let spaced = self.last_send.map(|t| t + self.min_interval);
        match (spaced, not_before) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn record(&mut self, at: Instant) {
        self.last_send = Some(at);
    }

    #[must_use]
    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for ReportPacer {
    fn default() -> Self {
        Self::new(MIN_SEND_INTERVAL)
    }
}

/// Wait until `deadline`, racing `cancel`.
///
/// Returns [`RunError::Cancelled`] if the token fires first or was already
/// set on entry.
pub async fn wait_until<C: Clock, X: Cancel>(
    clock: &C,
    deadline: Option<Instant>,
    cancel: &X,
) -> Result<(), RunError> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }
    let Some(deadline) = deadline else {
        return Ok(());
    };
    if clock.now() >= deadline {
        return Ok(());
    }
    match select(clock.sleep_until(deadline), cancel.cancelled()).await {
        Either::First(()) => Ok(()),
        Either::Second(()) => Err(RunError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{CancelToken, NeverCancel};
    use crate::testing::MockClock;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_first_send_unpaced() {
        let pacer = ReportPacer::default();
        assert_eq!(pacer.deadline(None), None);
        let t = Instant::from_millis(5);
        assert_eq!(pacer.deadline(Some(t)), Some(t));
    }

    #[test]
    fn test_deadline_is_later_of_spacing_and_hold() {
        let mut pacer = ReportPacer::default();
        pacer.record(Instant::from_millis(100));
        assert_eq!(pacer.deadline(None), Some(Instant::from_millis(103)));
        assert_eq!(
            pacer.deadline(Some(Instant::from_millis(200))),
            Some(Instant::from_millis(200))
        );
        assert_eq!(
            pacer.deadline(Some(Instant::from_millis(101))),
            Some(Instant::from_millis(103))
        );
    }

    #[test]
    fn test_wait_advances_to_absolute_deadline() {
        let clock = MockClock::at(Instant::from_millis(10));
        block_on(wait_until(&clock, Some(Instant::from_millis(110)), &NeverCancel)).unwrap();
        assert_eq!(clock.now(), Instant::from_millis(110));
        // Past deadlines return without sleeping.
        block_on(wait_until(&clock, Some(Instant::from_millis(50)), &NeverCancel)).unwrap();
        assert_eq!(clock.now(), Instant::from_millis(110));
    }

    #[test]
    fn test_cancelled_wait() {
        let clock = MockClock::new();
        let token = CancelToken::<NoopRawMutex>::new();
        token.cancel();
        let start = clock.now();
        assert_eq!(
            block_on(wait_until(&clock, Some(start + Duration::from_secs(5)), &token)),
            Err(RunError::Cancelled)
        );
        assert_eq!(clock.now(), start);
    }
}
