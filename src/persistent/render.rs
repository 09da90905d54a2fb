//! Text rendering of tree versions for debugging.
//!
//! The layout is a depth-first, pre-order dump: one block per node holding
//! its identifier and keys, followed by its children one level deeper.
//!
//! ```text
//! (5) V:[4], C:[
//!    (3) V:[3], C:[
//!    ],
//!    (4) V:[4, 5], C:[
//!    ]
//! ]
//! ```
//!
//! This is a debugging aid, not an interchange format.

use super::node::{Node, NodeRef};
use std::fmt;

/// Spaces of indentation per tree level.
const INDENT_WIDTH: usize = 3;

/// Prefix of every history line.
const HISTORY_PREFIX: &str = "HIST: ";

/// [`Display`](fmt::Display) adapter for a subtree.
pub struct Rendered<'a, K> {
    node: &'a Node<K>,
    depth: usize,
}

impl<'a, K> Rendered<'a, K> {
    /// Renders `node` as the top of the dump.
    #[must_use]
    pub const fn new(node: &'a Node<K>) -> Self {
        Self { node, depth: 0 }
    }
}

impl<K: fmt::Debug> fmt::Display for Rendered<'_, K> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pad = "";
        let width = self.depth * INDENT_WIDTH;
        writeln!(
            formatter,
            "{pad:width$}({}) V:{:?}, C:[",
            self.node.id(),
            self.node.keys()
        )?;
        for (position, child) in self.node.children().iter().enumerate() {
            if position > 0 {
                writeln!(formatter, ",")?;
            }
            let rendered = Rendered {
                node: child,
                depth: self.depth + 1,
            };
            write!(formatter, "{rendered}")?;
        }
        if !self.node.is_leaf() {
            writeln!(formatter)?;
        }
        write!(formatter, "{pad:width$}]")
    }
}

/// [`Display`](fmt::Display) adapter for a tree's version history.
///
/// Writes one `HIST: ` block per past version, oldest first, and finishes
/// with the current version.
pub struct RenderedHistory<'a, K> {
    history: &'a [NodeRef<K>],
    current: &'a Node<K>,
}

impl<'a, K> RenderedHistory<'a, K> {
    pub(crate) const fn new(history: &'a [NodeRef<K>], current: &'a Node<K>) -> Self {
        Self { history, current }
    }
}

impl<K: fmt::Debug> fmt::Display for RenderedHistory<'_, K> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for version in self.history {
            writeln!(formatter, "{HISTORY_PREFIX}{}", Rendered::new(version))?;
        }
        write!(formatter, "{HISTORY_PREFIX}{}", Rendered::new(self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::ReferenceCounter;
    use crate::persistent::node::NodeIds;
    use rstest::rstest;

    #[rstest]
    fn test_render_leaf() {
        let mut ids = NodeIds::new();
        let node = Node::from_parts(ids.allocate(), vec![3, 5], Vec::new());
        assert_eq!(Rendered::new(&node).to_string(), "(0) V:[3, 5], C:[\n]");
    }

    #[rstest]
    fn test_render_nested() {
        let mut ids = NodeIds::new();
        let left = ReferenceCounter::new(Node::from_parts(ids.allocate(), vec![3], Vec::new()));
        let right = ReferenceCounter::new(Node::from_parts(ids.allocate(), vec![4, 5], Vec::new()));
        let root = Node::from_parts(ids.allocate(), vec![4], vec![left, right]);

        let expected = "\
(2) V:[4], C:[
   (0) V:[3], C:[
   ],
   (1) V:[4, 5], C:[
   ]
]";
        assert_eq!(Rendered::new(&root).to_string(), expected);
    }

    #[rstest]
    fn test_render_history() {
        let mut ids = NodeIds::new();
        let old = ReferenceCounter::new(Node::from_parts(ids.allocate(), vec![3], Vec::new()));
        let current = Node::from_parts(ids.allocate(), vec![3, 5], Vec::new());
        let history = vec![old];

        let rendered = RenderedHistory::new(&history, &current).to_string();
        assert_eq!(rendered, "HIST: (0) V:[3], C:[\n]\nHIST: (1) V:[3, 5], C:[\n]");
    }
}
