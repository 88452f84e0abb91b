//! Platform-agnostic controller drivers, report pacing and macro runner.
//!
//! This crate sits between the macro engine and the USB transport. It has
//! no chip dependencies and runs on the host for testing.
//!
//! # Overview
//!
//! - [`sink`]: report destination trait ([`ReportSink`])
//! - [`clock`]: time source trait ([`Clock`])
//! - [`pacer`]: minimum send spacing and cancellable absolute waits
//! - [`controller`]: device profile trait ([`Controller`])
//! - [`generic`] / [`pro`]: HORIPAD S and Pro Controller profiles
//! - [`chain`]: `A:0.5->B` action chains ([`do_action`])
//! - [`realtime`]: live input slot with idle decay
//! - [`runner`]: request queue and macro runner ([`MacroRunner`])
//! - [`dispatch`]: command payload handling ([`Dispatcher`])
//! - [`config`]: JSON configuration ([`Config`])
//!
//! # Wiring
//!
//! The firmware builds one controller, one [`RunControl`] and one
//! [`ScriptStore`](macro_engine::ScriptStore) at boot, then runs
//! [`MacroRunner::run`] and the profile's output loop as tasks while the
//! command link feeds payloads into a [`Dispatcher`].
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded logging)
//! - **`log`**: Route logging through the `log` facade

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

// This must go first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod cancel;
pub mod chain;
pub mod clock;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod generic;
pub mod pacer;
pub mod pro;
pub mod realtime;
pub mod runner;
pub mod sink;

#[cfg(test)]
mod testing;

pub use cancel::{Cancel, CancelToken, NeverCancel};
pub use chain::{do_action, parse_chain, ChainStep};
pub use clock::{Clock, EmbassyClock};
pub use config::{Autorun, Config, ConfigError, Profile, Timing};
pub use controller::{Controller, Report};
pub use dispatch::Dispatcher;
pub use error::RunError;
pub use generic::GenericController;
pub use pacer::{wait_until, ReportPacer};
pub use pro::ProController;
pub use realtime::RealtimeSlot;
pub use runner::{MacroRunner, RunControl, RunOutcome};
pub use sink::{send_with_retry, OutputError, ReportSink};
