//! Copy-on-write nodes of the persistent multiway tree.
//!
//! A [`Node`] is immutable once it has been wrapped in a [`NodeRef`] and
//! published as part of a tree version. Every change is made on a fresh
//! shallow clone: the key sequence is copied, the child handles are shared.
//! Only the nodes on the path from the root to the insertion point are ever
//! cloned, so every other subtree is reused by the new version as-is.
//!
//! # Internal Structure
//!
//! - Keys are strictly increasing.
//! - A leaf has no children; an internal node with `k` keys has `k + 1`.
//! - Leaves hold every key. A leaf split copies the promoted key into the
//!   right sibling, so internal keys are separators only: `children[i]` holds
//!   keys below `keys[i]` and not below `keys[i - 1]`.

use super::ReferenceCounter;
use smallvec::SmallVec;
use std::borrow::Borrow;
use std::fmt;

/// Inline key capacity before a node spills to the heap.
const INLINE_KEYS: usize = 4;

/// Inline child capacity before a node spills to the heap.
const INLINE_CHILDREN: usize = INLINE_KEYS + 1;

/// Shared handle to a published node.
///
/// The same handle may be reachable from many tree versions at once.
pub type NodeRef<K> = ReferenceCounter<Node<K>>;

// =============================================================================
// Node Identifiers
// =============================================================================

/// Debug label of a node, unique within the tree that allocated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Returns the raw identifier value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Monotonic identifier source owned by a single tree.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeIds {
    next: u64,
}

impl NodeIds {
    pub(crate) const fn new() -> Self {
        Self { next: 0 }
    }

    pub(crate) const fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of identifiers handed out so far.
    #[cfg(test)]
    pub(crate) const fn allocated(&self) -> u64 {
        self.next
    }
}

// =============================================================================
// Insert Outcome
// =============================================================================

/// Result of inserting into a subtree.
///
/// The nodes carried here are fresh and not yet published; the caller wraps
/// them into [`NodeRef`]s when it links them into its own clone.
pub(crate) enum Insertion<K> {
    /// The key was already present. Nothing was cloned.
    Duplicate,
    /// The subtree absorbed the key without overflowing.
    Unsplit(Node<K>),
    /// The subtree overflowed and must be replaced by two siblings.
    Split {
        promoted: K,
        left: Node<K>,
        right: Node<K>,
    },
}

// =============================================================================
// Node Definition
// =============================================================================

/// A node of the persistent multiway tree.
///
/// Nodes are only ever observed through shared [`NodeRef`] handles, for
/// example via [`BTree::current_snapshot`](super::BTree::current_snapshot) or
/// a history entry, and are read-only from the outside.
#[derive(Debug)]
pub struct Node<K> {
    id: NodeId,
    keys: SmallVec<[K; INLINE_KEYS]>,
    children: SmallVec<[NodeRef<K>; INLINE_CHILDREN]>,
}

impl<K> Node<K> {
    /// Creates a leaf without keys. Only valid as the root of an empty tree.
    pub(crate) fn empty_leaf(id: NodeId) -> Self {
        Self {
            id,
            keys: SmallVec::new(),
            children: SmallVec::new(),
        }
    }

    /// Creates the root grown by a split of the previous root.
    pub(crate) fn grown_root(id: NodeId, promoted: K, left: NodeRef<K>, right: NodeRef<K>) -> Self {
        let mut keys = SmallVec::new();
        keys.push(promoted);
        let mut children = SmallVec::new();
        children.push(left);
        children.push(right);
        Self { id, keys, children }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(id: NodeId, keys: Vec<K>, children: Vec<NodeRef<K>>) -> Self {
        Self {
            id,
            keys: keys.into_iter().collect(),
            children: children.into_iter().collect(),
        }
    }

    /// Returns the identifier assigned when this node was created.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the keys of this node in ascending order.
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Returns the child handles of this node, empty for a leaf.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeRef<K>] {
        &self.children
    }

    /// Returns `true` if this node has no children.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the number of levels in the subtree rooted here.
    ///
    /// A lone leaf has height 1. All leaves sit at the same depth, so the
    /// leftmost path is representative.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = self;
        while let Some(first) = node.children.first() {
            node = &**first;
            height += 1;
        }
        height
    }

    /// Returns the number of nodes in the subtree rooted here.
    #[must_use]
    pub fn count_nodes(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.count_nodes())
            .sum::<usize>()
    }

    /// Returns an in-order iterator over the keys held by the leaves.
    ///
    /// Separator keys of internal nodes are not yielded twice: every key is
    /// reported once, from the leaf that holds it.
    #[must_use]
    pub fn leaf_keys(&self) -> LeafKeys<'_, K> {
        LeafKeys::new(self)
    }

    /// Returns the index of the child subtree that covers `value`.
    ///
    /// This is the smallest `i` with `value < keys[i]`, or `keys.len()` when
    /// `value` is not below any key. A value equal to a separator therefore
    /// descends right, into the subtree whose leaf holds it.
    pub fn find_child_index<Q>(&self, value: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        debug_assert!(!self.keys.is_empty(), "child lookup on a node without keys");
        self.keys
            .partition_point(|key| <K as Borrow<Q>>::borrow(key) <= value)
    }

    /// Returns `true` if the subtree rooted here holds `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = self;
        while !node.is_leaf() {
            node = &*node.children[node.find_child_index(value)];
        }
        node.keys
            .binary_search_by(|key| <K as Borrow<Q>>::borrow(key).cmp(value))
            .is_ok()
    }
}

impl<K: Ord> Node<K> {
    /// Inserts `value` at its sorted position.
    ///
    /// Only ever applied to a clone made during the current insert, before
    /// it is published. Returns `false` and leaves the keys untouched when
    /// `value` is already present.
    pub(crate) fn insert_non_full(&mut self, value: K) -> bool {
        match self.keys.binary_search(&value) {
            Ok(_) => false,
            Err(position) => {
                self.keys.insert(position, value);
                true
            }
        }
    }
}

impl<K: Ord + Clone> Node<K> {
    /// Copies the keys and shares the children under a new identifier.
    pub(crate) fn clone_shallow(&self, ids: &mut NodeIds) -> Self {
        Self {
            id: ids.allocate(),
            keys: self.keys.clone(),
            children: self.children.clone(),
        }
    }

    /// Splits an overflowing clone into `(promoted, left, right)`.
    ///
    /// The left node is `self` truncated in place and keeps its identifier.
    /// A leaf keeps the promoted key in its right sibling; an internal node
    /// hands it up to the parent and keeps it in neither half.
    ///
    /// # Panics
    ///
    /// Panics if the node does not hold exactly `MAX_KEYS + 1` keys.
    pub(crate) fn split<const MAX_KEYS: usize>(mut self, ids: &mut NodeIds) -> (K, Self, Self) {
        assert_eq!(
            self.keys.len(),
            MAX_KEYS + 1,
            "split called on node {} that is not over capacity",
            self.id
        );
        let mid = self.keys.len() / 2;
        let promoted = self.keys[mid].clone();

        let right = if self.is_leaf() {
            Self {
                id: ids.allocate(),
                keys: self.keys.drain(mid..).collect(),
                children: SmallVec::new(),
            }
        } else {
            let keys = self.keys.drain(mid + 1..).collect();
            let children = self.children.drain(mid + 1..).collect();
            self.keys.truncate(mid);
            Self {
                id: ids.allocate(),
                keys,
                children,
            }
        };

        tracing::trace!(
            left = %self.id,
            right = %right.id,
            leaf = right.is_leaf(),
            "split overflowing node"
        );
        (promoted, self, right)
    }

    /// Inserts `value` into the subtree rooted here without touching it.
    ///
    /// Returns the replacement for this node: a single clone, or the two
    /// halves of a clone that overflowed. Nothing is cloned for a duplicate.
    pub(crate) fn insert<const MAX_KEYS: usize>(&self, value: K, ids: &mut NodeIds) -> Insertion<K> {
        if self.is_leaf() {
            if self.keys.binary_search(&value).is_ok() {
                return Insertion::Duplicate;
            }
            let mut clone = self.clone_shallow(ids);
            clone.insert_non_full(value);
            return clone.settle::<MAX_KEYS>(ids);
        }

        let index = self.find_child_index(&value);
        match self.children[index].insert::<MAX_KEYS>(value, ids) {
            Insertion::Duplicate => Insertion::Duplicate,
            Insertion::Unsplit(child) => {
                let mut clone = self.clone_shallow(ids);
                clone.children[index] = ReferenceCounter::new(child);
                Insertion::Unsplit(clone)
            }
            Insertion::Split {
                promoted,
                left,
                right,
            } => {
                let mut clone = self.clone_shallow(ids);
                let absorbed = clone.insert_non_full(promoted);
                debug_assert!(absorbed, "promoted key already present in parent");
                clone.children[index] = ReferenceCounter::new(left);
                clone
                    .children
                    .insert(index + 1, ReferenceCounter::new(right));
                clone.settle::<MAX_KEYS>(ids)
            }
        }
    }

    fn settle<const MAX_KEYS: usize>(self, ids: &mut NodeIds) -> Insertion<K> {
        if self.keys.len() > MAX_KEYS {
            let (promoted, left, right) = self.split::<MAX_KEYS>(ids);
            Insertion::Split {
                promoted,
                left,
                right,
            }
        } else {
            Insertion::Unsplit(self)
        }
    }
}

// =============================================================================
// Leaf Key Iterator
// =============================================================================

/// In-order iterator over the leaf-held keys of a subtree.
pub struct LeafKeys<'a, K> {
    pending: Vec<std::slice::Iter<'a, NodeRef<K>>>,
    current: std::slice::Iter<'a, K>,
}

impl<'a, K> LeafKeys<'a, K> {
    fn new(root: &'a Node<K>) -> Self {
        let mut iterator = Self {
            pending: Vec::new(),
            current: <&[K]>::default().iter(),
        };
        iterator.descend(root);
        iterator
    }

    /// Walks down the leftmost path of `node`, remembering right siblings.
    fn descend(&mut self, mut node: &'a Node<K>) {
        while let Some((first, rest)) = node.children.split_first() {
            self.pending.push(rest.iter());
            node = &**first;
        }
        self.current = node.keys.iter();
    }
}

impl<'a, K> Iterator for LeafKeys<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.current.next() {
                return Some(key);
            }
            let next_child = loop {
                let siblings = self.pending.last_mut()?;
                match siblings.next() {
                    Some(child) => break child,
                    None => {
                        self.pending.pop();
                    }
                }
            };
            self.descend(next_child);
        }
    }
}

impl<K> std::iter::FusedIterator for LeafKeys<'_, K> {}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K: serde::Serialize> serde::Serialize for Node<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let children: Vec<&Self> = self.children.iter().map(|child| &**child).collect();
        let mut state = serializer.serialize_struct("Node", 3)?;
        state.serialize_field("id", &self.id.get())?;
        state.serialize_field("keys", self.keys.as_slice())?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

// =============================================================================
// Tests
// =============================================================================
