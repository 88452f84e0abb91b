//! Firmware configuration, read from JSON at startup.
//!
//! ```json
//! {
//!   "profile": "horipad-s",
//!   "autorun": { "name": "daily.loop", "loop": 0 },
//!   "macros": { "daily": "daily.loop" },
//!   "timing": { "min_send_interval_ms": 3 }
//! }
//! ```
//!
//! Every field is optional.

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt;

use embassy_time::Duration;
use macro_engine::StartRequest;
use serde::Deserialize;

/// Emulated device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Nintendo Switch Pro Controller (full protocol emulation).
    #[default]
    ProController,
    /// HORI HORIPAD S (plain HID joystick).
    HoripadS,
}

impl Profile {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ProController => "pro-controller",
            Self::HoripadS => "horipad-s",
        }
    }
}

/// Macro started at boot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Autorun {
    pub name: String,
    #[serde(rename = "loop", default = "default_loop")]
    pub loop_count: i64,
}

fn default_loop() -> i64 {
    1
}

/// Timing knobs, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct Timing {
    /// Minimum spacing between two input changes.
    pub min_send_interval_ms: u64,
    /// Pro Controller periodic report interval.
    pub tick_ms: u64,
    /// Realtime input decays to neutral after this long without updates.
    pub realtime_idle_ms: u64,
    /// Realtime polling interval for the generic profile.
    pub realtime_tick_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            min_send_interval_ms: 3,
            tick_ms: 1,
            realtime_idle_ms: 2_000,
            realtime_tick_ms: 3,
        }
    }
}

impl Timing {
    #[must_use]
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }

    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    #[must_use]
    pub fn realtime_idle(&self) -> Duration {
        Duration::from_millis(self.realtime_idle_ms)
    }

    #[must_use]
    pub fn realtime_tick(&self) -> Duration {
        Duration::from_millis(self.realtime_tick_ms.max(1))
    }
}

/// Error type for configuration parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Not valid JSON, or a field has the wrong shape.
    Invalid { line: usize, column: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { line, column } => write!(f, "invalid config at {line}:{column}"),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Invalid {
            line: e.line(),
            column: e.column(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: Profile,
    pub autorun: Option<Autorun>,
    /// Alias → fully qualified macro name.
    pub macros: BTreeMap<String, String>,
    pub timing: Timing,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse `json`, logging and falling back to defaults when it is invalid.
    #[must_use]
    pub fn from_json_or_default(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(config) => config,
            Err(ConfigError::Invalid { line, column }) => {
                error!("config invalid at {}:{}, using defaults", line, column);
                Self::default()
            }
        }
    }

    /// Follow the alias table; unknown names pass through.
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.macros.get(name).map_or(name, String::as_str)
    }

    /// The boot-time start request, with its alias resolved.
    #[must_use]
    pub fn autorun_request(&self) -> Option<StartRequest> {
        let autorun = self.autorun.as_ref()?;
        Some(StartRequest::new(
            self.resolve(&autorun.name),
            autorun.loop_count,
        ))
    }
}
