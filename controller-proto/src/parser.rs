//! Action-line token parser.
//!
//! An action line is a `|`-separated list of case-insensitive tokens:
//!
//! ```text
//! A|ZR|UP|LSTICK@100,-50
//! ```
//!
//! Buttons: `A B X Y L R ZL ZR PLUS MINUS HOME CAPTURE LCLICK RCLICK` plus
//! the aliases `START`, `SELECT`, `LS`, `RS`. Directions: `UP DOWN LEFT
//! RIGHT`. Sticks: `LSTICK@x,y` / `RSTICK@x,y` with offsets clamped to
//! [-128, 127]. Unknown tokens are ignored, so an empty line (or `clear`)
//! is the neutral state.

use crate::types::{Buttons, Dpad, InputState, Stick};

/// One recognised token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Token {
    Button(Buttons),
    Direction(Dpad),
    LeftStick(Stick),
    RightStick(Stick),
}

const BUTTON_NAMES: &[(&str, Buttons)] = &[
    ("A", Buttons::A),
    ("B", Buttons::B),
    ("X", Buttons::X),
    ("Y", Buttons::Y),
    ("L", Buttons::L),
    ("R", Buttons::R),
    ("ZL", Buttons::ZL),
    ("ZR", Buttons::ZR),
    ("PLUS", Buttons::PLUS),
    ("START", Buttons::PLUS),
    ("MINUS", Buttons::MINUS),
    ("SELECT", Buttons::MINUS),
    ("HOME", Buttons::HOME),
    ("CAPTURE", Buttons::CAPTURE),
    ("LCLICK", Buttons::LCLICK),
    ("LS", Buttons::LCLICK),
    ("RCLICK", Buttons::RCLICK),
    ("RS", Buttons::RCLICK),
];

const DIRECTION_NAMES: &[(&str, Dpad)] = &[
    ("UP", Dpad::UP),
    ("DOWN", Dpad::DOWN),
    ("LEFT", Dpad::LEFT),
    ("RIGHT", Dpad::RIGHT),
];

/// Decode a single token. Returns `None` for anything unrecognised.
#[must_use]
pub fn parse_token(token: &str) -> Option<Token> {
    let token = token.trim();
    if let Some((name, coords)) = token.split_once('@') {
        let stick = parse_stick(coords)?;
        return if name.eq_ignore_ascii_case("LSTICK") {
            Some(Token::LeftStick(stick))
        } else if name.eq_ignore_ascii_case("RSTICK") {
            Some(Token::RightStick(stick))
        } else {
            None
        };
    }

    if let Some((_, b)) = BUTTON_NAMES.iter().find(|(n, _)| n.eq_ignore_ascii_case(token)) {
        return Some(Token::Button(*b));
    }
    DIRECTION_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(token))
        .map(|(_, d)| Token::Direction(*d))
}

fn parse_stick(coords: &str) -> Option<Stick> {
    let (x, y) = coords.split_once(',')?;
    Some(Stick::new(parse_axis(x)?, parse_axis(y)?))
}

fn parse_axis(value: &str) -> Option<i8> {
    let value = value.trim();
    let v = match value.parse::<i32>() {
        Ok(v) => v,
        Err(_) => value.parse::<f32>().ok().filter(|f| f.is_finite())? as i32,
    };
    Some(v.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8)
}

/// Decode a whole action line into an input snapshot.
///
/// A direction token repeated immediately after itself recentres the d-pad.
#[must_use]
pub fn parse_action_line(line: &str) -> InputState {
    let mut state = InputState::neutral();
    let mut previous: Option<Token> = None;

    for raw in line.split('|') {
        let Some(token) = parse_token(raw) else {
            previous = None;
            continue;
        };
        match token {
            Token::Button(b) => state.buttons |= b,
            Token::Direction(_) if previous == Some(token) => state.dpad = Dpad::CENTER,
            Token::Direction(d) => state.dpad.press(d),
            Token::LeftStick(s) => state.left_stick = s,
            Token::RightStick(s) => state.right_stick = s,
        }
        previous = Some(token);
    }

    state
}

impl InputState {
    /// Shorthand for [`parse_action_line`].
    #[must_use]
    pub fn from_action_line(line: &str) -> Self {
        parse_action_line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_case_insensitive() {
        let s = parse_action_line("a|Zr|home");
        assert_eq!(s.buttons, Buttons::A | Buttons::ZR | Buttons::HOME);
        assert_eq!(s.dpad, Dpad::CENTER);
    }

    #[test]
    fn test_aliases() {
        let s = parse_action_line("START|SELECT|LS|RS");
        assert_eq!(
            s.buttons,
            Buttons::PLUS | Buttons::MINUS | Buttons::LCLICK | Buttons::RCLICK
        );
    }

    #[test]
    fn test_sticks_and_clamping() {
        let s = parse_action_line("A|LSTICK@100,-50|rstick@300,-300");
        assert!(s.buttons.contains(Buttons::A));
        assert_eq!(s.left_stick, Stick::new(100, -50));
        assert_eq!(s.right_stick, Stick::new(127, -128));
    }

    #[test]
    fn test_fractional_stick_offsets_truncate() {
        assert_eq!(parse_action_line("LSTICK@12.7,-3.2").left_stick, Stick::new(12, -3));
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(parse_action_line("").is_neutral());
        assert!(parse_action_line("clear").is_neutral());
        assert!(parse_action_line("LSTICK@bad").is_neutral());
        assert_eq!(parse_action_line("bogus|B").buttons, Buttons::B);
    }

    #[test]
    fn test_diagonal_and_repeat_toggle() {
        assert_eq!(parse_action_line("UP|RIGHT").dpad.hat(), 1);
        assert_eq!(parse_action_line("UP|UP").dpad, Dpad::CENTER);
        // Not adjacent: stays pressed.
        assert_eq!(parse_action_line("UP|A|UP").dpad, Dpad::UP);
        assert_eq!(parse_action_line("LEFT|LEFT|DOWN").dpad, Dpad::DOWN);
    }
}
