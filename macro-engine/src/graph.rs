//! Node graphs: the parsed, immutable form of one macro.
//!
//! A [`Graph`] owns the action lines of one macro in order. A [`Node`] is a
//! cheap borrowed position inside a graph: it knows its own line, its
//! successor and the head of the graph it belongs to, which is all the
//! action cursor needs to restart a loop without external bookkeeping.
//!
//! The position one past the last line is the *finished* sentinel.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ptr;

/// The ordered action lines of one macro.
///
/// Built once by the script store and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    lines: Vec<String>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a graph from a sequence of lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a line at the tail of the graph.
    pub fn append(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Number of action lines.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The first node of the graph.
    ///
    /// For an empty graph this is already the finished sentinel.
    #[inline]
    #[must_use]
    pub fn head(&self) -> Node<'_> {
        Node {
            graph: self,
            index: 0,
        }
    }

    /// All lines, in order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// A position inside a [`Graph`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    graph: &'a Graph,
    index: usize,
}

impl<'a> Node<'a> {
    /// The action line at this position, or `None` at the finished sentinel.
    #[inline]
    #[must_use]
    pub fn action(&self) -> Option<&'a str> {
        self.graph.lines.get(self.index).map(String::as_str)
    }

    /// Whether this is the finished sentinel of its graph.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.index >= self.graph.len()
    }

    /// The following node. The sentinel is its own successor.
    #[inline]
    #[must_use]
    pub fn next(&self) -> Node<'a> {
        Node {
            graph: self.graph,
            index: (self.index + 1).min(self.graph.len()),
        }
    }

    /// The first node of the graph this node belongs to.
    #[inline]
    #[must_use]
    pub fn head(&self) -> Node<'a> {
        self.graph.head()
    }

    /// The graph this node belongs to.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.graph, other.graph) && self.index == other.index
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("action", &self.action())
            .finish()
    }
}
