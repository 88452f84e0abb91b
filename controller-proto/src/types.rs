//! Logical controller input: buttons, d-pad and sticks.

use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Button state as a bitfield.
///
/// The low byte and high byte follow the primary and secondary button bytes
/// of the generic joystick report, so encoding that report is a plain split.
///
/// # Example
///
/// ```
/// use controller_proto::Buttons;
///
/// let buttons = Buttons::A | Buttons::ZR;
/// assert!(buttons.contains(Buttons::A));
/// assert!(!buttons.contains(Buttons::B));
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(pub u16);

impl Buttons {
    pub const Y: Self = Self(1 << 0);
    pub const B: Self = Self(1 << 1);
    pub const A: Self = Self(1 << 2);
    pub const X: Self = Self(1 << 3);
    pub const L: Self = Self(1 << 4);
    pub const R: Self = Self(1 << 5);
    pub const ZL: Self = Self(1 << 6);
    pub const ZR: Self = Self(1 << 7);
    pub const MINUS: Self = Self(1 << 8);
    pub const PLUS: Self = Self(1 << 9);
    pub const LCLICK: Self = Self(1 << 10); // Left stick press
    pub const RCLICK: Self = Self(1 << 11); // Right stick press
    pub const HOME: Self = Self(1 << 12);
    pub const CAPTURE: Self = Self(1 << 13);

    /// No buttons pressed.
    pub const NONE: Self = Self(0);

    /// Check if the given button(s) are pressed.
    #[inline]
    #[must_use]
    pub const fn contains(self, button: Buttons) -> bool {
        (self.0 & button.0) == button.0
    }

    /// Set or clear button(s).
    #[inline]
    pub fn set(&mut self, button: Buttons, pressed: bool) {
        if pressed {
            self.0 |= button.0;
        } else {
            self.0 &= !button.0;
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Buttons {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Buttons {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Buttons {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for Buttons {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for Buttons {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

/// Pressed d-pad directions.
///
/// Several may be held at once; [`Dpad::hat`] resolves them into the eight
/// HAT positions, cancelling opposite pairs.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dpad(pub u8);

impl Dpad {
    pub const UP: Self = Self(1 << 0);
    pub const DOWN: Self = Self(1 << 1);
    pub const LEFT: Self = Self(1 << 2);
    pub const RIGHT: Self = Self(1 << 3);

    pub const CENTER: Self = Self(0);

    /// HAT value for a centred d-pad.
    pub const HAT_CENTER: u8 = 8;

    #[inline]
    #[must_use]
    pub const fn contains(self, dir: Dpad) -> bool {
        (self.0 & dir.0) == dir.0
    }

    #[inline]
    pub fn press(&mut self, dir: Dpad) {
        self.0 |= dir.0;
    }

    /// Effective (vertical, horizontal) direction: -1, 0 or 1 on each axis,
    /// up and left negative. Opposite presses cancel.
    #[must_use]
    pub const fn axes(self) -> (i8, i8) {
        let v = self.contains(Self::DOWN) as i8 - self.contains(Self::UP) as i8;
        let h = self.contains(Self::RIGHT) as i8 - self.contains(Self::LEFT) as i8;
        (v, h)
    }

    /// HAT switch position: 0 = up, clockwise to 7 = up-left, 8 = centred.
    #[must_use]
    pub const fn hat(self) -> u8 {
        match self.axes() {
            (-1, 0) => 0,
            (-1, 1) => 1,
            (0, 1) => 2,
            (1, 1) => 3,
            (1, 0) => 4,
            (1, -1) => 5,
            (0, -1) => 6,
            (-1, -1) => 7,
            _ => Self::HAT_CENTER,
        }
    }
}

impl BitOr for Dpad {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Analog stick offset from centre.
///
/// Range is [-128, 127] on both axes; `y` grows downwards.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stick {
    pub x: i8,
    pub y: i8,
}

impl Stick {
    pub const NEUTRAL: Self = Self { x: 0, y: 0 };

    #[must_use]
    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }
}

/// Complete logical input snapshot decoded from one action line.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputState {
    pub buttons: Buttons,
    pub dpad: Dpad,
    pub left_stick: Stick,
    pub right_stick: Stick,
}

impl InputState {
    /// Nothing pressed, sticks centred.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            buttons: Buttons::NONE,
            dpad: Dpad::CENTER,
            left_stick: Stick::NEUTRAL,
            right_stick: Stick::NEUTRAL,
        }
    }

    #[must_use]
    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_bitwise_or() {
        let buttons = Buttons::A | Buttons::B;
        assert!(buttons.contains(Buttons::A));
        assert!(buttons.contains(Buttons::B));
        assert!(!buttons.contains(Buttons::X));
    }

    #[test]
    fn test_buttons_set_clear() {
        let mut buttons = Buttons::NONE;
        buttons.set(Buttons::HOME, true);
        assert!(buttons.contains(Buttons::HOME));
        buttons.set(Buttons::HOME, false);
        assert!(buttons.is_empty());
    }

    #[test]
    fn test_hat_positions() {
        assert_eq!(Dpad::CENTER.hat(), 8);
        assert_eq!(Dpad::UP.hat(), 0);
        assert_eq!((Dpad::UP | Dpad::RIGHT).hat(), 1);
        assert_eq!(Dpad::RIGHT.hat(), 2);
        assert_eq!((Dpad::DOWN | Dpad::RIGHT).hat(), 3);
        assert_eq!(Dpad::DOWN.hat(), 4);
        assert_eq!((Dpad::DOWN | Dpad::LEFT).hat(), 5);
        assert_eq!(Dpad::LEFT.hat(), 6);
        assert_eq!((Dpad::UP | Dpad::LEFT).hat(), 7);
    }

    #[test]
    fn test_opposite_directions_cancel() {
        assert_eq!((Dpad::UP | Dpad::DOWN).hat(), 8);
        assert_eq!((Dpad::UP | Dpad::DOWN | Dpad::LEFT).hat(), 6);
        assert_eq!((Dpad::LEFT | Dpad::RIGHT).axes(), (0, 0));
    }

    #[test]
    fn test_neutral_state() {
        assert!(InputState::neutral().is_neutral());
        assert_eq!(InputState::default(), InputState::neutral());
    }
}
