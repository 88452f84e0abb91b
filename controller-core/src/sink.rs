//! Report sink trait and error types.

use core::fmt;
use core::future::Future;

/// Immediate retries after a transient [`OutputError::WouldBlock`].
pub const SEND_RETRIES: usize = 3;

/// Error type for output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// Endpoint busy, try again.
    WouldBlock,
    /// Host gone (USB suspended or unplugged).
    Disconnected,
    /// Other transport failure.
    Io,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WouldBlock => write!(f, "endpoint busy"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Io => write!(f, "i/o error"),
        }
    }
}

/// Async trait for report destinations.
///
/// Abstracts the USB HID endpoint so drivers can be exercised on the host.
///
/// # `no_std` Compatibility
///
/// Implementations must not allocate.
pub trait ReportSink {
    /// Send one raw report (including the report id, if the device uses
    /// report ids).
    fn send_report(&mut self, report: &[u8]) -> impl Future<Output = Result<(), OutputError>>;
}

impl<S: ReportSink> ReportSink for &mut S {
    fn send_report(&mut self, report: &[u8]) -> impl Future<Output = Result<(), OutputError>> {
        (**self).send_report(report)
    }
}

/// Send `report`, retrying a bounded number of times while the sink
/// reports [`OutputError::WouldBlock`]. Other errors return at once.
pub async fn send_with_retry<S: ReportSink>(sink: &mut S, report: &[u8]) -> Result<(), OutputError> {
    let mut attempt = 0;
    loop {
        match sink.send_report(report).await {
            Err(OutputError::WouldBlock) if attempt < SEND_RETRIES => {
                attempt += 1;
                trace!("send would block, retry {}", attempt);
            }
            result => return result,
        }
    }
}
