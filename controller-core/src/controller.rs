//! Controller capability trait, implemented once per device profile.

use core::future::Future;

use embassy_time::{Duration, Instant};
use macro_engine::CommandError;

use crate::cancel::{Cancel, NeverCancel};
use crate::clock::Clock;
use crate::error::RunError;

/// Largest report any profile produces (Pro Controller id + payload).
pub const MAX_REPORT_LEN: usize = 64;

/// Encoded device report.
pub type Report = heapless::Vec<u8, MAX_REPORT_LEN>;

/// What the macro runner and dispatcher need from a device profile.
///
/// All methods take `&self`: one controller is shared by the runner, the
/// realtime path and the command link.
pub trait Controller {
    type Clock: Clock;

    fn clock(&self) -> &Self::Clock;

    /// Encode one action line into this profile's report layout.
    fn encode(&self, line: &str) -> Report;

    /// Present `line` to the host, no earlier than `not_before` and no
    /// sooner than the minimum send interval after the previous send.
    ///
    /// The pacing wait is raced against `cancel`; a report already being
    /// written is never interrupted. Returns the instant the line took
    /// effect, which is the reference point for its hold.
    fn send<X: Cancel>(
        &self,
        line: &str,
        not_before: Option<Instant>,
        cancel: &X,
    ) -> impl Future<Output = Result<Instant, RunError>>;

    /// Neutral send that always completes; used as cleanup after a run.
    fn release(&self) -> impl Future<Output = Result<Instant, RunError>> {
        self.send("", None, &NeverCancel)
    }

    /// Send `line`, hold it, then send neutral.
    fn key_press<X: Cancel>(
        &self,
        line: &str,
        hold: Duration,
        cancel: &X,
    ) -> impl Future<Output = Result<Instant, RunError>> {
        async move {
            let pressed = self.send(line, None, cancel).await?;
            self.send("", Some(pressed + hold), cancel).await
        }
    }

    fn start_realtime(&self);

    fn stop_realtime(&self);

    fn is_realtime(&self) -> bool;

    /// Replace the live input line. Fails while realtime mode is off.
    fn set_realtime_action(&self, line: &str) -> Result<(), CommandError>;

    /// Whether `~` in an action chain keeps the previous input held.
    fn holds_previous(&self) -> bool {
        false
    }
}
