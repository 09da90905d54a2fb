//! Versioned, copy-on-write multiway search tree.
//!
//! This module provides [`BTree`], an ordered key index in which every
//! insertion publishes a new, fully queryable version while the previous one
//! stays intact and reachable through the tree's history.
//!
//! # Overview
//!
//! - O(log N) insert, cloning one node per level plus split siblings
//! - O(log N) `contains`
//! - O(1) `len`, `version`, `current_snapshot`
//! - Every past version is kept and shares all untouched subtrees with
//!   its successors
//!
//! # Examples
//!
//! ```rust
//! use lodestone::persistent::BTree;
//!
//! let mut tree: BTree<i32> = BTree::new();
//! tree.insert(3);
//! tree.insert(5);
//! let before_split = tree.current_snapshot();
//! tree.insert(4);
//!
//! // The root split: [4] over [3] and [4, 5].
//! let root = tree.current_snapshot();
//! assert_eq!(root.keys(), &[4]);
//! assert_eq!(root.children()[0].keys(), &[3]);
//! assert_eq!(root.children()[1].keys(), &[4, 5]);
//!
//! // The previous version is untouched.
//! assert_eq!(before_split.keys(), &[3, 5]);
//! assert_eq!(tree.history().len(), 3);
//! ```

use super::ReferenceCounter;
use super::node::{Insertion, LeafKeys, Node, NodeIds, NodeRef};
use super::render::{Rendered, RenderedHistory};
use super::validate::{InvariantViolation, validate};
use std::borrow::Borrow;
use std::fmt;

/// Default node capacity: two keys and three children per node.
pub const DEFAULT_MAX_KEYS: usize = 2;

// =============================================================================
// BTree Definition
// =============================================================================

/// A persistent multiway search tree over bare keys.
///
/// `MAX_KEYS` is the number of keys a node may hold; a node that reaches
/// `MAX_KEYS + 1` keys during an insert is split in two. It must be at least
/// 2, which is checked at compile time.
///
/// Inserting never modifies a published node. The nodes on the path to the
/// insertion point are cloned, the clones absorb the key, and the new root is
/// swapped in once the whole version is built. The replaced root is appended
/// to [`history`](Self::history).
///
/// # Examples
///
/// ```rust
/// use lodestone::persistent::BTree;
///
/// let tree: BTree<i32> = (1..=7).collect();
/// assert_eq!(tree.height(), 3);
/// assert_eq!(tree.keys().copied().collect::<Vec<_>>(), (1..=7).collect::<Vec<_>>());
/// ```
#[derive(Clone)]
pub struct BTree<K, const MAX_KEYS: usize = DEFAULT_MAX_KEYS> {
    /// Root of the current version
    root: NodeRef<K>,
    /// Roots of every earlier version, oldest first
    history: Vec<NodeRef<K>>,
    /// Identifier source for nodes created by this tree
    ids: NodeIds,
    /// Number of keys in the current version
    length: usize,
}

impl<K, const MAX_KEYS: usize> BTree<K, MAX_KEYS> {
    const VALID_ORDER: () = assert!(
        MAX_KEYS >= 2,
        "MAX_KEYS must be at least 2 for internal splits to keep a key on each side"
    );

    /// Creates an empty tree whose root is a leaf without keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lodestone::persistent::BTree;
    ///
    /// let tree: BTree<u64> = BTree::new();
    /// assert!(tree.is_empty());
    /// assert_eq!(tree.height(), 1);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let () = Self::VALID_ORDER;
        let mut ids = NodeIds::new();
        let root = ReferenceCounter::new(Node::empty_leaf(ids.allocate()));
        Self {
            root,
            history: Vec::new(),
            ids,
            length: 0,
        }
    }

    /// Returns the number of keys in the current version.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the current version holds no keys.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the number of levels of the current version.
    #[must_use]
    pub fn height(&self) -> usize {
        self.root.height()
    }

    /// Returns the number of versions published after the initial empty one.
    ///
    /// This equals the number of inserts that changed the tree.
    #[inline]
    #[must_use]
    pub fn version(&self) -> usize {
        self.history.len()
    }

    /// Returns a handle to the root of the current version.
    ///
    /// The handle stays valid, and its subtree unchanged, no matter how many
    /// inserts follow.
    #[must_use]
    pub fn current_snapshot(&self) -> NodeRef<K> {
        ReferenceCounter::clone(&self.root)
    }

    /// Returns the roots of all earlier versions, oldest first.
    ///
    /// `history()[0]` is the empty root the tree started with.
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[NodeRef<K>] {
        &self.history
    }

    /// Returns the root of the given version.
    ///
    /// Version `0` is the initial empty tree and [`version`](Self::version)
    /// is the current one. Returns `None` past the current version.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lodestone::persistent::BTree;
    ///
    /// let tree: BTree<i32> = [10, 20].into_iter().collect();
    /// assert_eq!(tree.snapshot_at(0).map(|root| root.keys().len()), Some(0));
    /// assert_eq!(tree.snapshot_at(1).map(|root| root.keys().to_vec()), Some(vec![10]));
    /// assert_eq!(tree.snapshot_at(2).map(|root| root.keys().to_vec()), Some(vec![10, 20]));
    /// assert!(tree.snapshot_at(3).is_none());
    /// ```
    #[must_use]
    pub fn snapshot_at(&self, version: usize) -> Option<&NodeRef<K>> {
        match version.cmp(&self.history.len()) {
            std::cmp::Ordering::Less => self.history.get(version),
            std::cmp::Ordering::Equal => Some(&self.root),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Returns an in-order iterator over the keys of the current version.
    #[must_use]
    pub fn keys(&self) -> LeafKeys<'_, K> {
        self.root.leaf_keys()
    }

    /// Returns `true` if the current version holds `key`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.root.contains(key)
    }

    /// Renders every version, oldest first, one `HIST: ` block each.
    #[must_use]
    pub fn render_history(&self) -> RenderedHistory<'_, K> {
        RenderedHistory::new(&self.history, &self.root)
    }
}

impl<K: Ord + Clone, const MAX_KEYS: usize> BTree<K, MAX_KEYS> {
    /// Inserts `value`, publishing a new version if it was not present.
    ///
    /// Returns `false` for a duplicate. A duplicate insert is a no-op: the
    /// current root is kept and no history entry is recorded.
    ///
    /// # Complexity
    ///
    /// O(log N) time; clones at most one node per level plus the siblings
    /// created by splits.
    pub fn insert(&mut self, value: K) -> bool {
        let next_root = match self.root.insert::<MAX_KEYS>(value, &mut self.ids) {
            Insertion::Duplicate => {
                tracing::trace!(version = self.version(), "duplicate key ignored");
                return false;
            }
            Insertion::Unsplit(root) => root,
            Insertion::Split {
                promoted,
                left,
                right,
            } => {
                let root = Node::grown_root(
                    self.ids.allocate(),
                    promoted,
                    ReferenceCounter::new(left),
                    ReferenceCounter::new(right),
                );
                tracing::debug!(height = root.height(), "root split, tree grew a level");
                root
            }
        };

        let previous = std::mem::replace(&mut self.root, ReferenceCounter::new(next_root));
        self.history.push(previous);
        self.length += 1;
        tracing::debug!(
            version = self.version(),
            length = self.length,
            "published new version"
        );
        true
    }

    /// Checks the structural rules on the current version.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        validate::<K, MAX_KEYS>(&self.root)
    }

    /// Checks the structural rules on every version, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn validate_history(&self) -> Result<(), InvariantViolation> {
        self.history
            .iter()
            .chain(std::iter::once(&self.root))
            .try_for_each(|root| validate::<K, MAX_KEYS>(root))
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, const MAX_KEYS: usize> Default for BTree<K, MAX_KEYS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, const MAX_KEYS: usize> Extend<K> for BTree<K, MAX_KEYS> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<K: Ord + Clone, const MAX_KEYS: usize> FromIterator<K> for BTree<K, MAX_KEYS> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<'a, K, const MAX_KEYS: usize> IntoIterator for &'a BTree<K, MAX_KEYS> {
    type Item = &'a K;
    type IntoIter = LeafKeys<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys()
    }
}

impl<K: fmt::Debug, const MAX_KEYS: usize> fmt::Debug for BTree<K, MAX_KEYS> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BTree")
            .field("max_keys", &MAX_KEYS)
            .field("version", &self.version())
            .field("length", &self.length)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K: fmt::Debug, const MAX_KEYS: usize> fmt::Display for BTree<K, MAX_KEYS> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", Rendered::new(&self.root))
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K: serde::Serialize, const MAX_KEYS: usize> serde::Serialize for BTree<K, MAX_KEYS> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for key in self {
            sequence.serialize_element(key)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, K, const MAX_KEYS: usize> serde::Deserialize<'de> for BTree<K, MAX_KEYS>
where
    K: serde::Deserialize<'de> + Ord + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let keys = Vec::<K>::deserialize(deserializer)?;
        Ok(keys.into_iter().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
