//! Pro Controller protocol emulation, free of I/O.
//!
//! The host talks to the controller through HID output reports:
//!
//! - `0x80` USB commands (status query, handshake, connect, disconnect)
//! - `0x01` subcommands (device info, SPI flash reads, mode switches, ...)
//! - `0x10` rumble only, ignored
//!
//! [`ProtocolEmulator`] turns each inbound report into at most one reply and
//! builds the periodic `0x30` input report. Both are counter-stamped with a
//! timer derived from elapsed time, so the caller only has to supply
//! timestamps and move bytes.

use embassy_time::Instant;
use heapless::Vec;

use crate::report::{encode_pro, PRO_INPUT_LEN};
use crate::types::InputState;

/// Payload length of every report (the report id travels separately).
pub const REPORT_PAYLOAD_LEN: usize = 63;

/// Report ids used by the protocol.
pub mod report_id {
    /// Host → device: subcommand with rumble data.
    pub const SUBCOMMAND: u8 = 0x01;
    /// Host → device: rumble only.
    pub const RUMBLE: u8 = 0x10;
    /// Host → device: USB command.
    pub const USB_COMMAND: u8 = 0x80;
    /// Device → host: subcommand reply.
    pub const SUBCOMMAND_REPLY: u8 = 0x21;
    /// Device → host: standard full input report.
    pub const FULL_INPUT: u8 = 0x30;
    /// Device → host: USB command reply.
    pub const USB_REPLY: u8 = 0x81;
}

/// Reported Bluetooth address.
pub const MAC_ADDRESS: [u8; 6] = [0x00, 0x00, 0x5E, 0x00, 0x53, 0x5E];

/// Serial number blob stored at SPI 0x6000.
pub const SERIAL_NUMBER: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];

/// Offset of the subcommand id inside a `0x01` payload (after the packet
/// counter and eight rumble bytes).
const SUBCOMMAND_OFFSET: usize = 9;

/// Report timer ticks per second.
const COUNTER_HZ: u64 = 360;

/// Largest data block a subcommand reply can carry.
const MAX_REPLY_DATA: usize = REPORT_PAYLOAD_LEN - 1 - PRO_INPUT_LEN - 2;

/// Simulated SPI flash, keyed by start address.
const SPI_TABLE: &[(u16, &[u8])] = &[
    // Serial number
    (0x6000, &SERIAL_NUMBER),
    // Body, buttons, left grip, right grip colours
    (0x6050, &[0xBC, 0x11, 0x42, 0x75, 0xA9, 0x28, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
    // Factory stick calibration: none
    (0x603D, &[0xFF; 18]),
    // User stick calibration: none
    (0x8010, &[0xFF; 24]),
    // Factory stick parameters 2
    (0x6098, &[0x00; 18]),
    // Six-axis horizontal offsets
    (0x6080, &[0x50, 0xFD, 0x00, 0x00, 0xC6, 0x0F]),
    // Stick parameters
    (
        0x6086,
        &[
            0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0xFA, 0xFF, 0xD0, 0xFF, 0xC7, 0xFF, 0x3B, 0x34,
            0x3B, 0x34, 0x3B, 0x34,
        ],
    ),
    // Six-axis calibration
    (
        0x6020,
        &[
            0x09, 0x01, 0x18, 0xFF, 0xED, 0xFF, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0xFA, 0xFF,
            0xD0, 0xFF, 0xC7, 0xFF, 0x3B, 0x34, 0x3B, 0x34, 0x3B, 0x34,
        ],
    ),
];

/// One report to send: id plus a zero-padded 63-byte payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutboundReport {
    pub id: u8,
    pub payload: [u8; REPORT_PAYLOAD_LEN],
}

impl OutboundReport {
    /// Build a report from `data`, truncated or zero-padded to 63 bytes.
    #[must_use]
    pub fn new(id: u8, data: &[u8]) -> Self {
        let mut payload = [0u8; REPORT_PAYLOAD_LEN];
        let len = data.len().min(REPORT_PAYLOAD_LEN);
        payload[..len].copy_from_slice(&data[..len]);
        Self { id, payload }
    }

    /// Report id followed by the payload.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; REPORT_PAYLOAD_LEN + 1] {
        let mut out = [0u8; REPORT_PAYLOAD_LEN + 1];
        out[0] = self.id;
        out[1..].copy_from_slice(&self.payload);
        out
    }
}

/// Look up simulated SPI flash contents, sized to `len`.
///
/// Shorter blobs are padded with `0xFF`; unknown addresses return `None`.
#[must_use]
pub fn spi_read(address: u16, len: u8) -> Option<Vec<u8, MAX_REPLY_DATA>> {
    let (_, blob) = SPI_TABLE.iter().find(|(a, _)| *a == address)?;
    let len = usize::from(len).min(MAX_REPLY_DATA);
    let mut data = Vec::new();
    for i in 0..len {
        // Cannot overflow: len is capped at capacity.
        let _ = data.push(blob.get(i).copied().unwrap_or(0xFF));
    }
    Some(data)
}

/// Protocol session state.
#[derive(Debug, Clone)]
pub struct ProtocolEmulator {
    connected: bool,
    start: Instant,
}

impl ProtocolEmulator {
    /// New session, disconnected, with the report timer starting at `start`.
    #[must_use]
    pub const fn new(start: Instant) -> Self {
        Self {
            connected: false,
            start,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// 8-bit report timer: 360 ticks per second since session start,
    /// independent of how many reports were sent.
    #[must_use]
    pub fn counter(&self, now: Instant) -> u8 {
        let elapsed_us = now.saturating_duration_since(self.start).as_micros();
        ((elapsed_us * COUNTER_HZ / 1_000_000) & 0xFF) as u8
    }

    /// Periodic `0x30` input report, or `None` while disconnected.
    #[must_use]
    pub fn periodic_report(&self, input: &InputState, now: Instant) -> Option<OutboundReport> {
        if !self.connected {
            return None;
        }
        Some(self.stamped(report_id::FULL_INPUT, input, &[], now))
    }

    /// Handle one inbound output report; `report[0]` is its id.
    ///
    /// `input` is the current logical input, embedded in subcommand replies.
    pub fn handle_output_report(
        &mut self,
        report: &[u8],
        input: &InputState,
        now: Instant,
    ) -> Option<OutboundReport> {
        let (&id, payload) = report.split_first()?;
        match id {
            report_id::USB_COMMAND => self.handle_usb_command(payload),
            report_id::SUBCOMMAND => self.handle_subcommand(payload, input, now),
            report_id::RUMBLE => None,
            _ => None,
        }
    }

    fn handle_usb_command(&mut self, payload: &[u8]) -> Option<OutboundReport> {
        let &command = payload.first()?;
        match command {
            0x01 => {
                let mut data = [0u8; 9];
                data[..3].copy_from_slice(&[0x01, 0x00, 0x03]);
                data[3..].copy_from_slice(&MAC_ADDRESS);
                Some(OutboundReport::new(report_id::USB_REPLY, &data))
            }
            0x02 | 0x03 => Some(OutboundReport::new(report_id::USB_REPLY, &[command])),
            0x04 => {
                self.connected = true;
                None
            }
            0x05 => {
                self.connected = false;
                None
            }
            _ => None,
        }
    }

    fn handle_subcommand(
        &mut self,
        payload: &[u8],
        input: &InputState,
        now: Instant,
    ) -> Option<OutboundReport> {
        let &subcommand = payload.get(SUBCOMMAND_OFFSET)?;
        let args = payload.get(SUBCOMMAND_OFFSET + 1..).unwrap_or_default();

        let mut data: Vec<u8, MAX_REPLY_DATA> = Vec::new();
        let code = match subcommand {
            // Bluetooth manual pairing
            0x01 => {
                let _ = data.push(0x03);
                0x81
            }
            // Device info: firmware 4.33, Pro Controller, MAC, colours in SPI
            0x02 => {
                let _ = data.extend_from_slice(&[0x04, 0x21, 0x03, 0x02]);
                let _ = data.extend_from_slice(&MAC_ADDRESS);
                let _ = data.extend_from_slice(&[0x01, 0x01]);
                0x82
            }
            // Mode, shipment, NFC/IR state, player lights, HOME light, IMU,
            // vibration: plain acknowledge
            0x03 | 0x08 | 0x22 | 0x30 | 0x33 | 0x38 | 0x40 | 0x41 | 0x48 => 0x80,
            // Trigger buttons elapsed time
            0x04 => 0x83,
            // NFC/IR MCU configuration
            0x21 => {
                let _ = data.extend_from_slice(&[0x01, 0x00, 0xFF, 0x00, 0x08, 0x00, 0x1B, 0x01]);
                0xA0
            }
            0x10 => {
                let address = u16::from_le_bytes([*args.first()?, *args.get(1)?]);
                let len = *args.get(4)?;
                let blob = spi_read(address, len)?;
                let _ = data.extend_from_slice(&[args[0], args[1], 0x00, 0x00, len]);
                for b in blob {
                    if data.push(b).is_err() {
                        break;
                    }
                }
                0x90
            }
            // Unsupported subcommands get no reply
            _ => return None,
        };

        let mut reply: Vec<u8, { MAX_REPLY_DATA + 2 }> = Vec::new();
        let _ = reply.extend_from_slice(&[code, subcommand]);
        let _ = reply.extend_from_slice(&data);
        Some(self.stamped(report_id::SUBCOMMAND_REPLY, input, &reply, now))
    }

    /// `[counter] + input block + tail`, padded to the payload length.
    fn stamped(&self, id: u8, input: &InputState, tail: &[u8], now: Instant) -> OutboundReport {
        let mut payload = [0u8; REPORT_PAYLOAD_LEN];
        payload[0] = self.counter(now);
        payload[1..=PRO_INPUT_LEN].copy_from_slice(&encode_pro(input));
        let start = 1 + PRO_INPUT_LEN;
        let len = tail.len().min(REPORT_PAYLOAD_LEN - start);
        payload[start..start + len].copy_from_slice(&tail[..len]);
        OutboundReport { id, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_action_line;
    use embassy_time::Duration;

    fn t(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn subcommand(id: u8, args: &[u8]) -> [u8; 64] {
        let mut report = [0u8; 64];
        report[0] = report_id::SUBCOMMAND;
        report[1 + SUBCOMMAND_OFFSET] = id;
        report[2 + SUBCOMMAND_OFFSET..2 + SUBCOMMAND_OFFSET + args.len()].copy_from_slice(args);
        report
    }

    fn spi_request(address: u16, len: u8) -> [u8; 64] {
        let [lo, hi] = address.to_le_bytes();
        subcommand(0x10, &[lo, hi, 0x00, 0x00, len])
    }

    #[test]
    fn test_counter_from_elapsed_time() {
        let emu = ProtocolEmulator::new(t(1000));
        assert_eq!(emu.counter(t(1000)), 0);
        assert_eq!(emu.counter(t(1500)), 180);
        // 1 s = 360 ticks, wraps at 256.
        assert_eq!(emu.counter(t(2000)), (360 & 0xFF) as u8);
        assert_eq!(emu.counter(t(1000) + Duration::from_micros(2778)), 1);
        // Before start saturates to zero.
        assert_eq!(emu.counter(t(0)), 0);
    }

    #[test]
    fn test_usb_handshake() {
        let mut emu = ProtocolEmulator::new(t(0));
        let input = InputState::neutral();

        let reply = emu.handle_output_report(&[0x80, 0x01], &input, t(1)).unwrap();
        assert_eq!(reply.id, report_id::USB_REPLY);
        assert_eq!(&reply.payload[..9], &[0x01, 0x00, 0x03, 0x00, 0x00, 0x5E, 0x00, 0x53, 0x5E]);
        assert!(reply.payload[9..].iter().all(|b| *b == 0));

        let reply = emu.handle_output_report(&[0x80, 0x02], &input, t(2)).unwrap();
        assert_eq!(reply.id, report_id::USB_REPLY);
        assert_eq!(reply.payload[0], 0x02);
        assert_eq!(emu.handle_output_report(&[0x80, 0x03], &input, t(3)).unwrap().payload[0], 0x03);
    }

    #[test]
    fn test_disconnect_halts_periodic_until_reconnect() {
        let mut emu = ProtocolEmulator::new(t(0));
        let input = parse_action_line("A");
        assert!(emu.periodic_report(&input, t(1)).is_none());

        assert!(emu.handle_output_report(&[0x80, 0x04], &input, t(2)).is_none());
        let report = emu.periodic_report(&input, t(3)).unwrap();
        assert_eq!(report.id, report_id::FULL_INPUT);
        assert_eq!(report.payload[0], emu.counter(t(3)));
        assert_eq!(&report.payload[1..12], &encode_pro(&input));

        emu.handle_output_report(&[0x80, 0x05], &input, t(4));
        assert!(!emu.is_connected());
        assert!(emu.periodic_report(&input, t(5)).is_none());
        assert!(emu.periodic_report(&input, t(50)).is_none());

        emu.handle_output_report(&[0x80, 0x04], &input, t(60));
        assert!(emu.periodic_report(&input, t(61)).is_some());
    }

    #[test]
    fn test_device_info_reply() {
        let mut emu = ProtocolEmulator::new(t(0));
        let input = InputState::neutral();
        let reply = emu
            .handle_output_report(&subcommand(0x02, &[]), &input, t(10))
            .unwrap();
        assert_eq!(reply.id, report_id::SUBCOMMAND_REPLY);
        assert_eq!(reply.payload[0], emu.counter(t(10)));
        assert_eq!(&reply.payload[1..12], &encode_pro(&input));
        assert_eq!(&reply.payload[12..14], &[0x82, 0x02]);
        assert_eq!(
            &reply.payload[14..26],
            &[0x04, 0x21, 0x03, 0x02, 0x00, 0x00, 0x5E, 0x00, 0x53, 0x5E, 0x01, 0x01]
        );
    }

    #[test]
    fn test_acknowledged_subcommands() {
        let mut emu = ProtocolEmulator::new(t(0));
        let input = InputState::neutral();
        for sub in [0x03, 0x08, 0x22, 0x30, 0x33, 0x38, 0x40, 0x41, 0x48] {
            let reply = emu.handle_output_report(&subcommand(sub, &[]), &input, t(0)).unwrap();
            assert_eq!(&reply.payload[12..14], &[0x80, sub]);
        }
        let reply = emu.handle_output_report(&subcommand(0x04, &[]), &input, t(0)).unwrap();
        assert_eq!(&reply.payload[12..14], &[0x83, 0x04]);
        let reply = emu.handle_output_report(&subcommand(0x01, &[]), &input, t(0)).unwrap();
        assert_eq!(&reply.payload[12..15], &[0x81, 0x01, 0x03]);
        let reply = emu.handle_output_report(&subcommand(0x21, &[]), &input, t(0)).unwrap();
        assert_eq!(
            &reply.payload[12..22],
            &[0xA0, 0x21, 0x01, 0x00, 0xFF, 0x00, 0x08, 0x00, 0x1B, 0x01]
        );
    }

    #[test]
    fn test_unsupported_subcommand_and_ids() {
        let mut emu = ProtocolEmulator::new(t(0));
        let input = InputState::neutral();
        assert!(emu.handle_output_report(&subcommand(0x50, &[]), &input, t(0)).is_none());
        assert!(emu.handle_output_report(&[0x10, 0, 1, 2], &input, t(0)).is_none());
        assert!(emu.handle_output_report(&[0x42], &input, t(0)).is_none());
        assert!(emu.handle_output_report(&[], &input, t(0)).is_none());
        // Truncated subcommand report.
        assert!(emu.handle_output_report(&[0x01, 0, 0], &input, t(0)).is_none());
    }

    #[test]
    fn test_serial_number_read_is_stable() {
        let mut emu = ProtocolEmulator::new(t(0));
        let a = emu
            .handle_output_report(&spi_request(0x6000, 16), &parse_action_line("A"), t(5))
            .unwrap();
        let b = emu
            .handle_output_report(&spi_request(0x6000, 16), &parse_action_line("B|UP"), t(900))
            .unwrap();
        assert_eq!(&a.payload[12..14], &[0x90, 0x10]);
        assert_eq!(&a.payload[14..19], &[0x00, 0x60, 0x00, 0x00, 16]);
        assert_eq!(&a.payload[19..35], &SERIAL_NUMBER);
        assert_eq!(&a.payload[12..35], &b.payload[12..35]);
    }

    #[test]
    fn test_spi_read_resizes() {
        let data = spi_read(0x6080, 8).unwrap();
        assert_eq!(data.as_slice(), &[0x50, 0xFD, 0x00, 0x00, 0xC6, 0x0F, 0xFF, 0xFF]);
        let data = spi_read(0x6050, 3).unwrap();
        assert_eq!(data.as_slice(), &[0xBC, 0x11, 0x42]);
        assert!(spi_read(0x1234, 4).is_none());
    }

    #[test]
    fn test_unknown_spi_address_no_reply() {
        let mut emu = ProtocolEmulator::new(t(0));
        let input = InputState::neutral();
        assert!(emu.handle_output_report(&spi_request(0x7000, 4), &input, t(0)).is_none());
    }

    #[test]
    fn test_outbound_report_bytes() {
        let report = OutboundReport::new(0x81, &[1, 2, 3]);
        let bytes = report.as_bytes();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[..4], &[0x81, 1, 2, 3]);
        assert!(bytes[4..].iter().all(|b| *b == 0));
        let long = [7u8; 80];
        assert_eq!(OutboundReport::new(0x21, &long).payload, [7u8; 63]);
    }
}
