//! Controller input state, report encoders and Pro Controller protocol.
//!
//! This crate provides everything between an action line and the bytes on
//! the USB wire:
//!
//! - **Types**: [`Buttons`], [`Dpad`], [`Stick`], [`InputState`]
//! - **Parsing**: [`parse_action_line()`] turns `A|UP|LSTICK@100,-50` into
//!   an [`InputState`]
//! - **Reports**: [`encode_generic()`] (8-byte HORIPAD S report) and
//!   [`encode_pro()`] (11-byte Pro Controller input block)
//! - **Protocol**: [`ProtocolEmulator`] answers the Pro Controller handshake,
//!   subcommands and SPI flash reads, and stamps periodic input reports
//!
//! # Example
//!
//! ```
//! use controller_proto::{encode_generic, parse_action_line, Buttons};
//!
//! let state = parse_action_line("A|LSTICK@100,-50");
//! assert!(state.buttons.contains(Buttons::A));
//!
//! let report = encode_generic(&state);
//! assert_eq!(report[3], 228); // LX: 100 + 128
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Derive `defmt::Format` on the public types
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod parser;
pub mod protocol;
pub mod report;
pub mod types;

pub use parser::{parse_action_line, parse_token, Token};
pub use protocol::{report_id, spi_read, OutboundReport, ProtocolEmulator, REPORT_PAYLOAD_LEN};
pub use report::{encode_generic, encode_pro, pack_stick, GENERIC_REPORT_LEN, PRO_INPUT_LEN};
pub use types::{Buttons, Dpad, InputState, Stick};
