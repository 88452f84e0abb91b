//! Macro scripting engine for the controller emulator.
//!
//! This crate is `no_std` compatible (it needs `alloc`) and turns `.m` macro
//! sources into a stream of action lines:
//!
//! - [`store`]: load and parse macro files into named graphs
//! - [`graph`]: immutable line graphs and borrowed node positions
//! - [`eval`]: restricted expression evaluator
//! - [`params`]: per-invocation parameter bindings
//! - [`cursor`]: the action cursor walking a graph
//! - [`command`]: JSON command payloads from the command link
//!
//! # Example
//!
//! ```
//! use macro_engine::{ActionCursor, ScriptStore};
//!
//! let store = ScriptStore::load(&[("demo.m", "<go>\nA:0.1\n[hop]*2\n<hop>\nB:0.1\n")]);
//! let mut cursor = ActionCursor::new(&store, "demo.go").unwrap();
//!
//! assert_eq!(cursor.pop(), (Some("A:0.1"), false));
//! assert_eq!(cursor.pop(), (Some("B:0.1"), false));
//! assert_eq!(cursor.pop(), (Some("B:0.1"), false));
//! assert_eq!(cursor.pop(), (None, true));
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

// This must go first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod command;
pub mod cursor;
pub mod eval;
pub mod graph;
pub mod params;
pub mod store;

pub use command::{Command, CommandError, Overrides, Response, StartRequest};
pub use cursor::ActionCursor;
pub use eval::{Bindings, EvalError, Value};
pub use graph::{Graph, Node};
pub use params::Params;
#[cfg(any(test, feature = "std"))]
pub use store::DirSource;
pub use store::{Script, ScriptSource, ScriptStore};
