//! UART command link: one JSON payload per line in, one status line out.
//!
//! # Pins
//!
//! Uses UART1 at 115200 8N1:
//! - GPIO 8: TX (status lines)
//! - GPIO 9: RX (command payloads)
//! - GPIO 10: CTS (optional, with `uart-flow-control` feature)
//! - GPIO 11: RTS (optional, with `uart-flow-control` feature)

use core::fmt::{self, Write as _};

use controller_core::{Controller, Dispatcher};
use embassy_rp::uart::{Async, Error as UartError, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::{String, Vec};

/// Longest accepted command line, excluding the newline.
pub const MAX_COMMAND_LEN: usize = 512;

const MAX_STATUS_LEN: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LinkError {
    Framing,
    /// Line longer than [`MAX_COMMAND_LEN`] or receiver overrun.
    Overflow,
    Io,
    /// Payload is not UTF-8.
    Utf8,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing => write!(f, "framing error"),
            Self::Overflow => write!(f, "line too long"),
            Self::Io => write!(f, "uart error"),
            Self::Utf8 => write!(f, "invalid utf-8"),
        }
    }
}

#[inline]
fn uart_error_to_link_error(e: UartError) -> LinkError {
    match e {
        UartError::Framing => LinkError::Framing,
        UartError::Overrun => LinkError::Overflow,
        _ => LinkError::Io,
    }
}

pub struct UartCommandLink<'d> {
    rx: UartRx<'d, Async>,
    tx: UartTx<'d, Async>,
    buffer: Vec<u8, MAX_COMMAND_LEN>,
}

impl<'d> UartCommandLink<'d> {
    #[must_use]
    pub fn new(rx: UartRx<'d, Async>, tx: UartTx<'d, Async>) -> Self {
        Self {
            rx,
            tx,
            buffer: Vec::new(),
        }
    }

    async fn read_byte(&mut self) -> Result<u8, LinkError> {
        let mut byte = [0u8; 1];
        self.rx
            .read(&mut byte)
            .await
            .map_err(uart_error_to_link_error)?;
        Ok(byte[0])
    }

    /// Read the next line, without its terminator.
    ///
    /// An overlong line is discarded up to its newline so the next read
    /// starts clean.
    pub async fn read_line(&mut self) -> Result<&str, LinkError> {
        self.buffer.clear();
        loop {
            let byte = self.read_byte().await?;
            if byte == b'\n' {
                break;
            }
            if self.buffer.push(byte).is_err() {
                while self.read_byte().await? != b'\n' {}
                return Err(LinkError::Overflow);
            }
        }
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        core::str::from_utf8(&self.buffer).map_err(|_| LinkError::Utf8)
    }

    /// Write `status` followed by a newline.
    pub async fn respond(&mut self, status: impl fmt::Display) -> Result<(), LinkError> {
        let mut line: String<MAX_STATUS_LEN> = String::new();
        if writeln!(line, "{status}").is_err() {
            line.clear();
            let _ = line.push_str("error: response too long\n");
        }
        self.tx
            .write(line.as_bytes())
            .await
            .map_err(uart_error_to_link_error)
    }
}

/// Serve commands from `link` forever.
///
/// Framing errors are dropped silently; other link errors are reported back
/// as an error status so the sender can retry.
pub async fn serve_commands<M: RawMutex, C: Controller>(
    mut link: UartCommandLink<'static>,
    dispatcher: Dispatcher<'_, M, C>,
) -> ! {
    loop {
        let written = match link.read_line().await {
            Ok(payload) if payload.trim().is_empty() => continue,
            Ok(payload) => {
                let response = dispatcher.handle(payload);
                link.respond(&response).await
            }
            Err(LinkError::Framing) => {
                defmt::debug!("command link: framing error");
                continue;
            }
            Err(e) => {
                defmt::warn!("command link: {}", e);
                link.respond(format_args!("error: {e}")).await
            }
        };
        if let Err(e) = written {
            defmt::warn!("status write failed: {}", e);
        }
    }
}
