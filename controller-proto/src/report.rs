//! Device report encoders.
//!
//! # Generic joystick (HORIPAD S), 8 bytes
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | Y B A X L R ZL ZR (bit 0 first) |
//! | 1 | MINUS PLUS LCLICK RCLICK HOME CAPTURE |
//! | 2 | HAT: 0 = up, clockwise to 7, 8 = centred |
//! | 3-6 | LX LY RX RY, 128 = centre |
//! | 7 | vendor byte, always 0 |
//!
//! # Pro Controller input block, 11 bytes
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | connection / battery |
//! | 1 | right: Y X B A SR SL R ZR |
//! | 2 | shared: MINUS PLUS RCLICK LCLICK HOME CAPTURE |
//! | 3 | left: DOWN UP RIGHT LEFT SR SL L ZL |
//! | 4-6 | left stick, two 12-bit values |
//! | 7-9 | right stick, two 12-bit values |
//! | 10 | vibrator report |

use crate::types::{Buttons, Dpad, InputState, Stick};

/// Length of the generic joystick report.
pub const GENERIC_REPORT_LEN: usize = 8;

/// Length of the compact Pro Controller input block.
pub const PRO_INPUT_LEN: usize = 11;

/// Full-power battery, powered by USB.
pub const PRO_CONNECTION_INFO: u8 = 0x91;

/// Centre of the Pro Controller 12-bit stick range.
pub const PRO_STICK_CENTER: u16 = 2048;
const PRO_STICK_MAX: i32 = 4095;
const PRO_STICK_SCALE: i32 = 16;

/// Encode the generic 8-byte joystick report.
#[must_use]
pub fn encode_generic(state: &InputState) -> [u8; GENERIC_REPORT_LEN] {
    let [low, high] = state.buttons.raw().to_le_bytes();
    [
        low,
        high & 0x3F,
        state.dpad.hat(),
        generic_axis(state.left_stick.x),
        generic_axis(state.left_stick.y),
        generic_axis(state.right_stick.x),
        generic_axis(state.right_stick.y),
        0,
    ]
}

#[inline]
fn generic_axis(v: i8) -> u8 {
    (i16::from(v) + 128) as u8
}

const PRO_RIGHT: &[(Buttons, u8)] = &[
    (Buttons::Y, 0x01),
    (Buttons::X, 0x02),
    (Buttons::B, 0x04),
    (Buttons::A, 0x08),
    (Buttons::R, 0x40),
    (Buttons::ZR, 0x80),
];

const PRO_SHARED: &[(Buttons, u8)] = &[
    (Buttons::MINUS, 0x01),
    (Buttons::PLUS, 0x02),
    (Buttons::RCLICK, 0x04),
    (Buttons::LCLICK, 0x08),
    (Buttons::HOME, 0x10),
    (Buttons::CAPTURE, 0x20),
];

const PRO_LEFT: &[(Buttons, u8)] = &[(Buttons::L, 0x40), (Buttons::ZL, 0x80)];

fn collect(buttons: Buttons, table: &[(Buttons, u8)]) -> u8 {
    table
        .iter()
        .filter(|(b, _)| buttons.contains(*b))
        .fold(0, |acc, (_, bit)| acc | bit)
}

fn pro_dpad(dpad: Dpad) -> u8 {
    let (v, h) = dpad.axes();
    let mut bits = 0;
    if v > 0 {
        bits |= 0x01;
    }
    if v < 0 {
        bits |= 0x02;
    }
    if h > 0 {
        bits |= 0x04;
    }
    if h < 0 {
        bits |= 0x08;
    }
    bits
}

/// Scale a stick offset into the 12-bit range. Pro sticks count up as
/// positive, so `y` is inverted.
#[must_use]
pub fn pro_stick_values(stick: Stick) -> (u16, u16) {
    let scale = |v: i32| (i32::from(PRO_STICK_CENTER) + v * PRO_STICK_SCALE).clamp(0, PRO_STICK_MAX) as u16;
    (scale(i32::from(stick.x)), scale(-i32::from(stick.y)))
}

/// Pack two 12-bit values into three bytes, low nibble first.
#[must_use]
pub fn pack_stick(x: u16, y: u16) -> [u8; 3] {
    [
        (x & 0xFF) as u8,
        (((x >> 8) & 0x0F) | ((y & 0x0F) << 4)) as u8,
        ((y >> 4) & 0xFF) as u8,
    ]
}

/// Encode the 11-byte Pro Controller input block.
#[must_use]
pub fn encode_pro(state: &InputState) -> [u8; PRO_INPUT_LEN] {
    let (lx, ly) = pro_stick_values(state.left_stick);
    let (rx, ry) = pro_stick_values(state.right_stick);
    let left = pack_stick(lx, ly);
    let right = pack_stick(rx, ry);

    [
        PRO_CONNECTION_INFO,
        collect(state.buttons, PRO_RIGHT),
        collect(state.buttons, PRO_SHARED),
        collect(state.buttons, PRO_LEFT) | pro_dpad(state.dpad),
        left[0],
        left[1],
        left[2],
        right[0],
        right[1],
        right[2],
        0,
    ]
}
