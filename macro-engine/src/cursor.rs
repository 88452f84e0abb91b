//! Action cursor: walks a macro graph and yields one action line per pop.
//!
//! Jump lines (`[label]`, `[label]?expr`, `[label]*expr`) enter other graphs
//! through a stack of return frames; `body:` marks where a cycle restarts;
//! `EXEC>` lines update the parameter bindings without producing output.

use alloc::vec::Vec;
use core::ptr;

use crate::graph::{Graph, Node};
use crate::params::Params;
use crate::store::ScriptStore;

/// Marks the start of the repeated section of a macro.
pub const BODY_MARKER: &str = "body:";

/// Prefix of side-effect lines.
pub const EXEC_PREFIX: &str = "EXEC>";

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    return_to: Node<'a>,
    loop_remaining: u32,
    entered: &'a Graph,
}

#[derive(Debug, Clone)]
struct State<'a> {
    current: Node<'a>,
    loop_remaining: u32,
    frames: Vec<Frame<'a>>,
}

impl<'a> State<'a> {
    fn at(head: Node<'a>) -> Self {
        Self {
            current: head,
            loop_remaining: 1,
            frames: Vec::new(),
        }
    }
}

/// Cursor over one macro invocation.
#[derive(Debug)]
pub struct ActionCursor<'a> {
    store: &'a ScriptStore,
    head: Node<'a>,
    params: Params,
    state: State<'a>,
    body: State<'a>,
}

impl<'a> ActionCursor<'a> {
    /// Start `name` with its declared defaults.
    pub fn new(store: &'a ScriptStore, name: &str) -> Option<Self> {
        let script = store.get(name)?;
        let params = Params::new(script.defaults(), core::iter::empty());
        Some(Self::from_graph(store, script.graph(), params))
    }

    /// Start `name` with caller overrides from a command payload.
    pub fn with_overrides(
        store: &'a ScriptStore,
        name: &str,
        overrides: &serde_json::Map<alloc::string::String, serde_json::Value>,
    ) -> Option<Self> {
        let script = store.get(name)?;
        let params = Params::from_json(script.defaults(), overrides);
        Some(Self::from_graph(store, script.graph(), params))
    }

    /// Walk `graph` directly, resolving jumps against `store`.
    pub fn from_graph(store: &'a ScriptStore, graph: &'a Graph, params: Params) -> Self {
        let head = graph.head();
        Self {
            store,
            head,
            params,
            state: State::at(head),
            body: State::at(head),
        }
    }

    /// Next action line.
    ///
    /// Returns `(Some(line), false)` while running and `(None, true)` once
    /// the macro is exhausted. A finished cursor stays finished.
    pub fn pop(&mut self) -> (Option<&'a str>, bool) {
        loop {
            while self.jump() {}

            let Some(line) = self.state.current.action() else {
                return (None, true);
            };

            if line == BODY_MARKER {
                self.advance();
                if self.is_finished() {
                    return (None, true);
                }
                self.body = self.state.clone();
                continue;
            }

            if let Some(statements) = line.strip_prefix(EXEC_PREFIX) {
                self.params.exec(statements);
                self.advance();
                continue;
            }

            self.advance();
            return (Some(line), false);
        }
    }

    /// Restore the position saved at the last `body:` line, or the head if
    /// none was seen.
    pub fn cycle_reset(&mut self) {
        self.state = self.body.clone();
    }

    /// Restart from the head with no open frames.
    pub fn reset(&mut self) {
        self.state = State::at(self.head);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.current.is_finished()
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Number of open jump frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.frames.len()
    }

    /// Resolve one jump line at the current position.
    ///
    /// Returns `false` when the current line is not a jump.
    fn jump(&mut self) -> bool {
        let Some(line) = self.state.current.action() else {
            return false;
        };
        let Some((label, suffix)) = line.strip_prefix('[').and_then(|r| r.split_once(']')) else {
            return false;
        };

        let times = if let Some(expr) = suffix.strip_prefix('?') {
            i64::from(self.params.get_bool(expr))
        } else if let Some(expr) = suffix.strip_prefix('*') {
            self.params.get_int_or(expr, 1)
        } else {
            1
        };

        let target = self.store.graph(label).filter(|g| !g.is_empty());
        match target {
            Some(graph) if times >= 1 && !self.is_open(graph) => {
                self.state.frames.push(Frame {
                    return_to: self.state.current.next(),
                    loop_remaining: self.state.loop_remaining,
                    entered: graph,
                });
                self.state.current = graph.head();
                self.state.loop_remaining = u32::try_from(times).unwrap_or(u32::MAX);
            }
            Some(_) if times >= 1 => {
                warn!("recursive jump skipped: {}", label);
                self.advance();
            }
            Some(_) => self.advance(),
            None => {
                debug!("unknown label skipped: {}", label);
                self.advance();
            }
        }
        true
    }

    fn is_open(&self, graph: &Graph) -> bool {
        self.state.frames.iter().any(|f| ptr::eq(f.entered, graph))
    }

    fn advance(&mut self) {
        self.state.current = self.state.current.next();
        self.return_jump();
    }

    /// Leave finished graphs: loop back to the head while repetitions
    /// remain, otherwise resume the innermost pending frame.
    fn return_jump(&mut self) {
        while self.state.current.is_finished() {
            if self.state.loop_remaining > 1 {
                self.state.loop_remaining -= 1;
                self.state.current = self.state.current.head();
                return;
            }
            let Some(frame) = self.state.frames.pop() else {
                return;
            };
            self.state.current = frame.return_to;
            self.state.loop_remaining = frame.loop_remaining;
        }
    }
}
