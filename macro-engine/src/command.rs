//! Command payloads received over the command link.
//!
//! A payload is one JSON object:
//!
//! ```json
//! { "name": "daily.loop", "loop": 0, "paras": { "count": 3 },
//!   "stop": false, "realtime": "action_start" }
//! ```

use alloc::string::String;
use core::fmt;

use serde::Deserialize;

/// `realtime` value that enters realtime mode.
pub const REALTIME_START: &str = "action_start";
/// `realtime` value that leaves realtime mode.
pub const REALTIME_STOP: &str = "action_stop";

/// Parameter overrides carried by a start request.
pub type Overrides = serde_json::Map<String, serde_json::Value>;

/// Raw wire shape. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Payload {
    name: Option<String>,
    #[serde(rename = "loop")]
    loop_count: Option<i64>,
    paras: Option<Overrides>,
    stop: Option<bool>,
    realtime: Option<String>,
}

/// A request to run a macro.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub name: String,
    /// Number of cycles; `<= 0` runs until stopped.
    pub loop_count: i64,
    pub overrides: Overrides,
}

impl StartRequest {
    pub fn new(name: impl Into<String>, loop_count: i64) -> Self {
        Self {
            name: name.into(),
            loop_count,
            overrides: Overrides::new(),
        }
    }

    /// Whether the run repeats until stopped.
    #[must_use]
    pub fn is_endless(&self) -> bool {
        self.loop_count <= 0
    }
}

/// A decoded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(StartRequest),
    Stop,
    /// Stop the current run, then start this one.
    Restart(StartRequest),
    RealtimeStart,
    RealtimeStop,
    /// Live input line for realtime mode.
    RealtimeAction(String),
}

impl Command {
    /// Decode one payload.
    ///
    /// `realtime` takes precedence over everything else; `stop` with a
    /// `name` restarts; a bare `name` starts.
    pub fn parse(payload: &str) -> Result<Self, CommandError> {
        let payload: Payload =
            serde_json::from_str(payload.trim()).map_err(|_| CommandError::Malformed)?;

        if let Some(realtime) = payload.realtime {
            let line = realtime.trim();
            return Ok(match line {
                REALTIME_START => Command::RealtimeStart,
                REALTIME_STOP => Command::RealtimeStop,
                _ => Command::RealtimeAction(String::from(line)),
            });
        }

        let start = payload
            .name
            .filter(|name| !name.trim().is_empty())
            .map(|name| StartRequest {
                name: String::from(name.trim()),
                loop_count: payload.loop_count.unwrap_or(1),
                overrides: payload.paras.unwrap_or_default(),
            });

        match (payload.stop.unwrap_or(false), start) {
            (true, Some(start)) => Ok(Command::Restart(start)),
            (true, None) => Ok(Command::Stop),
            (false, Some(start)) => Ok(Command::Start(start)),
            (false, None) => Err(CommandError::Empty),
        }
    }
}

/// Error type for command handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Not a JSON object of the expected shape.
    Malformed,
    /// No actionable field present.
    Empty,
    /// No macro by that name.
    UnknownMacro,
    /// Realtime input while realtime mode is off.
    RealtimeInactive,
    /// Request queue is full.
    Busy,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed command"),
            Self::Empty => write!(f, "empty command"),
            Self::UnknownMacro => write!(f, "unknown macro"),
            Self::RealtimeInactive => write!(f, "realtime mode inactive"),
            Self::Busy => write!(f, "busy"),
        }
    }
}

/// Status returned to the command link for each payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Applied immediately.
    Accepted,
    /// Handed to the macro runner.
    Queued,
    Error(CommandError),
}

impl From<CommandError> for Response {
    fn from(e: CommandError) -> Self {
        Response::Error(e)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Queued => write!(f, "queued"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}
