//! Time source abstraction.

use core::future::Future;

use embassy_time::{Instant, Timer};

/// Monotonic clock with absolute-deadline sleeps.
///
/// Drivers take the clock as a parameter so pacing can be tested on the
/// host without real waits.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Sleep until `deadline`. Returns at once if it already passed.
    fn sleep_until(&self, deadline: Instant) -> impl Future<Output = ()>;
}

/// The embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) -> impl Future<Output = ()> {
        Timer::at(deadline)
    }
}

impl<C: Clock> Clock for &C {
    #[inline]
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Instant) -> impl Future<Output = ()> {
        (**self).sleep_until(deadline)
    }
}
