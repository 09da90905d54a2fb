//! Structural validation of tree versions.
//!
//! Every published version must satisfy the ordering, fan-out and capacity
//! rules of a [`Node`] tree. [`validate`] walks a version
//! once and reports the first rule it finds broken.

use super::node::{Node, NodeId};
use std::fmt;

/// Describes a broken structural rule, together with the node that breaks it.
///
/// # Examples
///
/// ```rust
/// use lodestone::persistent::BTree;
///
/// let tree: BTree<i32> = (0..32).collect();
/// assert_eq!(tree.validate(), Ok(()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Keys are not strictly increasing.
    UnsortedKeys {
        /// The offending node.
        node: NodeId,
    },
    /// An internal node does not have exactly one more child than keys.
    FanOutMismatch {
        /// The offending node.
        node: NodeId,
        /// Number of keys held.
        keys: usize,
        /// Number of children held.
        children: usize,
    },
    /// A published node holds more keys than the tree order allows.
    OverCapacity {
        /// The offending node.
        node: NodeId,
        /// Number of keys held.
        keys: usize,
        /// Capacity of the tree.
        max_keys: usize,
    },
    /// A node other than an empty root leaf holds no keys.
    EmptyNode {
        /// The offending node.
        node: NodeId,
    },
    /// A key lies outside the range its parent's separators assign to it.
    OutOfBounds {
        /// The offending node.
        node: NodeId,
    },
    /// Leaves sit at different depths.
    UnevenLeafDepth {
        /// The offending leaf.
        node: NodeId,
        /// Depth of the first leaf found.
        expected: usize,
        /// Depth of this leaf.
        actual: usize,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsortedKeys { node } => {
                write!(formatter, "node {node}: keys are not strictly increasing")
            }
            Self::FanOutMismatch {
                node,
                keys,
                children,
            } => write!(
                formatter,
                "node {node}: {keys} keys but {children} children"
            ),
            Self::OverCapacity {
                node,
                keys,
                max_keys,
            } => write!(
                formatter,
                "node {node}: {keys} keys exceed the capacity of {max_keys}"
            ),
            Self::EmptyNode { node } => write!(formatter, "node {node}: no keys"),
            Self::OutOfBounds { node } => {
                write!(formatter, "node {node}: key outside its separator range")
            }
            Self::UnevenLeafDepth {
                node,
                expected,
                actual,
            } => write!(
                formatter,
                "leaf {node}: depth {actual}, other leaves at depth {expected}"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Checks every structural rule on the subtree rooted at `root`.
///
/// `root` is treated as a tree root: it may be an empty leaf.
///
/// # Errors
///
/// Returns the first [`InvariantViolation`] found in pre-order.
pub fn validate<K: Ord, const MAX_KEYS: usize>(root: &Node<K>) -> Result<(), InvariantViolation> {
    let mut walker = Walker {
        max_keys: MAX_KEYS,
        leaf_depth: None,
    };
    walker.check(root, 1, None, None)
}

struct Walker {
    max_keys: usize,
    leaf_depth: Option<usize>,
}

impl Walker {
    fn check<K: Ord>(
        &mut self,
        node: &Node<K>,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
    ) -> Result<(), InvariantViolation> {
        let keys = node.keys();
        let id = node.id();

        if keys.len() > self.max_keys {
            return Err(InvariantViolation::OverCapacity {
                node: id,
                keys: keys.len(),
                max_keys: self.max_keys,
            });
        }
        if keys.is_empty() && (depth > 1 || !node.is_leaf()) {
            return Err(InvariantViolation::EmptyNode { node: id });
        }
        if !keys.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(InvariantViolation::UnsortedKeys { node: id });
        }
        let in_bounds = keys.iter().all(|key| {
            lower.is_none_or(|lower| key >= lower) && upper.is_none_or(|upper| key < upper)
        });
        if !in_bounds {
            return Err(InvariantViolation::OutOfBounds { node: id });
        }

        if node.is_leaf() {
            return match self.leaf_depth {
                None => {
                    self.leaf_depth = Some(depth);
                    Ok(())
                }
                Some(expected) if expected != depth => Err(InvariantViolation::UnevenLeafDepth {
                    node: id,
                    expected,
                    actual: depth,
                }),
                Some(_) => Ok(()),
            };
        }

        let children = node.children();
        if children.len() != keys.len() + 1 {
            return Err(InvariantViolation::FanOutMismatch {
                node: id,
                keys: keys.len(),
                children: children.len(),
            });
        }
        for (index, child) in children.iter().enumerate() {
            let child_lower = if index == 0 { lower } else { keys.get(index - 1) };
            let child_upper = keys.get(index).or(upper);
            self.check(child, depth + 1, child_lower, child_upper)?;
        }
        Ok(())
    }
}
