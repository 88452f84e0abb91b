//! Action chains: `A:0.5->B->0.2->~` sequences of held inputs.
//!
//! Each element is `line[:seconds]`. A bare number is a pause with no
//! input. The chain ends with an automatic release unless its last element
//! is `~` on a profile that supports holding.

use embassy_time::{Duration, Instant};

use crate::cancel::Cancel;
use crate::controller::Controller;
use crate::error::RunError;
use crate::pacer::wait_until;

pub const CHAIN_SEPARATOR: &str = "->";

/// Keep the previous input held.
pub const HOLD_PREVIOUS: &str = "~";

/// Hold used when an element gives no duration.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(100);

const MAX_HOLD_SECS: f64 = 86_400.0;

/// One parsed chain element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStep<'a> {
    pub line: &'a str,
    hold: Option<Duration>,
}

impl<'a> ChainStep<'a> {
    /// Parse one element. Elements with more than one `:` are rejected.
    pub fn parse(element: &'a str) -> Option<Self> {
        let mut parts = element.split(':');
        let line = parts.next().unwrap_or_default();
        let hold = parts.next();
        if parts.next().is_some() {
            return None;
        }
        Some(match hold {
            Some(hold) => Self {
                line,
                hold: Some(parse_seconds(hold).unwrap_or(DEFAULT_HOLD)),
            },
            None => match parse_seconds(line) {
                Some(pause) => Self {
                    line: "",
                    hold: Some(pause),
                },
                None => Self { line, hold: None },
            },
        })
    }

    #[must_use]
    pub fn hold(&self) -> Duration {
        self.hold.unwrap_or(DEFAULT_HOLD)
    }

    /// Hold only if one was written out.
    #[must_use]
    pub fn explicit_hold(&self) -> Option<Duration> {
        self.hold
    }
}

fn parse_seconds(s: &str) -> Option<Duration> {
    let secs: f64 = s.trim().parse().ok()?;
    Some(Duration::from_micros(
        (secs.clamp(0.0, MAX_HOLD_SECS) * 1_000_000.0) as u64,
    ))
}

/// Split an action line into its chain elements, dropping malformed ones.
pub fn parse_chain(action_line: &str) -> impl Iterator<Item = ChainStep<'_>> {
    action_line.split(CHAIN_SEPARATOR).filter_map(ChainStep::parse)
}

/// Play one action line on `controller`.
///
/// Each element is sent when the previous one's hold has run out, measured
/// from the instant the previous send took effect. Waits end early with
/// [`RunError::Cancelled`] when `cancel` fires.
pub async fn do_action<C: Controller, X: Cancel>(
    controller: &C,
    action_line: &str,
    cancel: &X,
) -> Result<(), RunError> {
    let holds_previous = controller.holds_previous();
    let mut release_at: Option<Instant> = None;
    let mut held = false;

    for step in parse_chain(action_line) {
        if holds_previous && step.line == HOLD_PREVIOUS {
            if let (Some(at), Some(extra)) = (release_at, step.explicit_hold()) {
                release_at = Some(at + extra);
            }
            held = true;
            continue;
        }
        held = false;
        let sent_at = controller.send(step.line, release_at, cancel).await?;
        release_at = Some(sent_at + step.hold());
    }

    if held {
        wait_until(controller.clock(), release_at, cancel).await
    } else {
        controller.send("", release_at, cancel).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{CancelToken, NeverCancel};
    use crate::clock::Clock;
    use crate::testing::{LineRecorder, MockClock};
    use alloc::string::String;
    use alloc::vec::Vec;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    fn steps(line: &str) -> Vec<(&str, u64)> {
        parse_chain(line)
            .map(|s| (s.line, s.hold().as_millis()))
            .collect()
    }

    fn expect(events: &[(u64, &str)]) -> Vec<(u64, String)> {
        events.iter().map(|&(t, l)| (t, String::from(l))).collect()
    }

    #[test]
    fn test_parse_elements() {
        assert_eq!(steps("A"), [("A", 100)]);
        assert_eq!(steps("A:0.5->B"), [("A", 500), ("B", 100)]);
        assert_eq!(steps("A->0.25->B:1"), [("A", 100), ("", 250), ("B", 1000)]);
        // Unparsable hold keeps the default
        assert_eq!(steps("A:soon"), [("A", 100)]);
        assert_eq!(steps("A:-1"), [("A", 0)]);
    }

    #[test]
    fn test_parse_drops_extra_colons() {
        assert_eq!(steps("A:1:2->B:0.2"), [("B", 200)]);
        assert!(steps("A:1:2").is_empty());
    }

    #[test]
    fn test_chain_timing_uses_send_instants() {
        let clock = MockClock::new();
        let start = clock.now();
        let ctrl = LineRecorder::new(&clock);
        block_on(do_action(&ctrl, "A:0.5->B:0.2", &NeverCancel)).unwrap();
        assert_eq!(
            ctrl.timeline(start),
            expect(&[(0, "A"), (500, "B"), (700, "")])
        );
    }

    #[test]
    fn test_bare_number_pauses_neutral() {
        let clock = MockClock::new();
        let start = clock.now();
        let ctrl = LineRecorder::new(&clock);
        block_on(do_action(&ctrl, "A->0.3", &NeverCancel)).unwrap();
        assert_eq!(
            ctrl.timeline(start),
            expect(&[(0, "A"), (100, ""), (400, "")])
        );
    }

    #[test]
    fn test_min_interval_for_zero_hold() {
        let clock = MockClock::new();
        let start = clock.now();
        let ctrl = LineRecorder::new(&clock);
        block_on(do_action(&ctrl, "A:0->B:0", &NeverCancel)).unwrap();
        assert_eq!(ctrl.timeline(start), expect(&[(0, "A"), (3, "B"), (6, "")]));
    }

    #[test]
    fn test_tilde_keeps_input_held() {
        let clock = MockClock::new();
        let start = clock.now();
        let ctrl = LineRecorder::new(&clock).holding_previous();
        block_on(do_action(&ctrl, "A:0.5->~:0.5", &NeverCancel)).unwrap();
        // No release; the call returns once the extended hold ran out.
        assert_eq!(ctrl.timeline(start), expect(&[(0, "A")]));
        assert_eq!((clock.now() - start).as_millis(), 1000);

        let clock = MockClock::new();
        let start = clock.now();
        let ctrl = LineRecorder::new(&clock).holding_previous();
        block_on(do_action(&ctrl, "A:0.2->~->B:0.1", &NeverCancel)).unwrap();
        assert_eq!(
            ctrl.timeline(start),
            expect(&[(0, "A"), (200, "B"), (300, "")])
        );
    }

    #[test]
    fn test_tilde_is_plain_line_without_hold_support() {
        let clock = MockClock::new();
        let ctrl = LineRecorder::new(&clock);
        block_on(do_action(&ctrl, "A->~", &NeverCancel)).unwrap();
        assert_eq!(ctrl.lines(), ["A", "~", ""]);
    }

    #[test]
    fn test_cancel_ends_hold() {
        let clock = MockClock::new();
        let token = CancelToken::<NoopRawMutex>::new();
        let ctrl = LineRecorder::new(&clock);
        token.cancel();
        assert_eq!(
            block_on(do_action(&ctrl, "A:5", &token)),
            Err(RunError::Cancelled)
        );
        assert!(ctrl.lines().is_empty());
    }
}
