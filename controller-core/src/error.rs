//! Error types for macro runs.

use core::fmt;

use crate::sink::OutputError;

/// Why a send or a macro run ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunError {
    /// Stopped by a command.
    Cancelled,
    /// The report sink failed after retries.
    Output(OutputError),
    /// The requested macro is not in the store.
    UnknownMacro,
}

impl From<OutputError> for RunError {
    fn from(e: OutputError) -> Self {
        RunError::Output(e)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::Output(e) => write!(f, "output error: {e}"),
            Self::UnknownMacro => write!(f, "unknown macro"),
        }
    }
}
