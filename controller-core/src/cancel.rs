//! Cooperative cancellation for macro runs.

use core::future::Future;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, Ordering};

/// Something a pending wait can be cancelled by.
pub trait Cancel {
    fn is_cancelled(&self) -> bool;

    /// Resolves once cancelled. Resolves at once if already cancelled.
    fn cancelled(&self) -> impl Future<Output = ()>;
}

/// Cancellation flag plus a wake-up for the task waiting on it.
///
/// Only one task may await [`Cancel::cancelled`] at a time.
pub struct CancelToken<M: RawMutex> {
    flag: AtomicBool,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> CancelToken<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            wake: Signal::new(),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        self.wake.signal(());
    }

    /// Clear a previous request, before starting a new run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
        self.wake.reset();
    }
}

impl<M: RawMutex> Default for CancelToken<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> Cancel for CancelToken<M> {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.wake.wait().await;
        }
    }
}

/// A token that is never cancelled, for cleanup sends that must complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl Cancel for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }

    fn cancelled(&self) -> impl Future<Output = ()> {
        core::future::pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::select::{select, Either};
    use embassy_futures::{block_on, yield_now};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_cancel_and_reset() {
        let token = CancelToken::<NoopRawMutex>::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        block_on(token.cancelled());
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let token = CancelToken::<NoopRawMutex>::new();
        let result = block_on(select(token.cancelled(), async {
            yield_now().await;
            token.cancel();
            core::future::pending::<()>().await
        }));
        assert!(matches!(result, Either::First(())));
    }

    #[test]
    fn test_never_cancel_stays_pending() {
        let result = block_on(select(NeverCancel.cancelled(), yield_now()));
        assert!(matches!(result, Either::Second(())));
    }
}
