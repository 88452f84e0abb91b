//! Macro-driven game controller emulator for RP2040.
//!
//! The firmware enumerates as either a Pro Controller or a HORIPAD S and
//! plays bundled macro scripts on request.
//!
//! # Overview
//!
//! 1. Command payloads arrive as JSON lines on UART (115200 baud, 8N1)
//! 2. The dispatcher queues macro runs or forwards realtime input
//! 3. The macro runner turns action lines into timed controller reports
//! 4. Reports go out over USB HID
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | UART1 TX | 8    | Status lines |
//! | UART1 RX | 9    | Command payloads |
//! | UART1 CTS | 10  | Optional, `uart-flow-control` |
//! | UART1 RTS | 11  | Optional, `uart-flow-control` |
//!
//! # Architecture
//!
//! Everything shared between tasks is built once in `main` and handed out
//! as `&'static`:
//!
//! - **USB Task**: runs the USB device stack
//! - **Output Task**: periodic reports (Pro Controller) or the realtime
//!   session loop (HORIPAD S)
//! - **Host Task** (Pro Controller only): answers handshake and subcommands
//! - **Runner Task**: plays queued macros
//! - **Command Task**: serves the UART command link
//! - **Autorun Task**: queues the configured macro once USB is up
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`uart-flow-control`**: Enable hardware flow control (CTS/RTS on GPIO 10/11)

#![no_std]

extern crate alloc;

pub mod command_link;
pub mod heap;
pub mod usb_output;

pub use command_link::{serve_commands, LinkError, UartCommandLink};
pub use usb_output::{UsbReportSink, UsbStateHandler, USB_CONFIGURED};

use controller_core::{
    Config, EmbassyClock, GenericController, ProController, RunControl,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_usb::class::hid::HidReader;
use macro_engine::ScriptStore;

use crate::usb_output::{read_host_report, UsbDriver, HORI_REPORT_SIZE, PRO_REPORT_SIZE};

/// Files and configuration baked in at build time.
pub mod assets {
    /// `config.json` from the crate root.
    pub const CONFIG_JSON: &str = include_str!("../config.json");

    include!(concat!(env!("OUT_DIR"), "/macros.rs"));
}

pub type ProPad = ProController<CriticalSectionRawMutex, UsbReportSink<PRO_REPORT_SIZE>, EmbassyClock>;
pub type HoriPad =
    GenericController<CriticalSectionRawMutex, UsbReportSink<HORI_REPORT_SIZE>, EmbassyClock>;
pub type Control = RunControl<CriticalSectionRawMutex>;

/// Answer host output reports forever.
pub async fn serve_host_reports(
    mut reader: HidReader<'static, UsbDriver, PRO_REPORT_SIZE>,
    pad: &ProPad,
) -> ! {
    let mut buf = [0u8; PRO_REPORT_SIZE];
    loop {
        let len = match read_host_report(&mut reader, &mut buf).await {
            Ok(len) => len,
            Err(e) => {
                defmt::debug!("host report read failed: {}", e);
                reader.ready().await;
                continue;
            }
        };
        if let Err(e) = pad.handle_output_report(&buf[..len]).await {
            defmt::warn!("host reply failed: {}", e);
        }
    }
}

/// Queue the configured boot macro once the host has configured the device.
pub async fn autorun(store: &ScriptStore, config: &Config, control: &Control) {
    let Some(request) = config.autorun_request() else {
        return;
    };
    USB_CONFIGURED.wait().await;
    if !store.contains(&request.name) {
        defmt::warn!("autorun macro {} not found", request.name.as_str());
        return;
    }
    defmt::info!("autorun {}", request.name.as_str());
    if let Err(e) = control.submit(request) {
        defmt::warn!("autorun rejected: {}", e);
    }
}
