//! Thread-safe publication of tree versions (requires the `arc` feature).
//!
//! [`SharedTree`] lets any number of threads read the latest version while
//! one insert at a time builds the next. Readers grab the published root
//! under a read lock that is held only for a handle clone; the writer builds
//! the whole new version outside that lock and publishes it with a single
//! swap. Readers are never blocked by the copy-on-write work itself.
//!
//! # Examples
//!
//! ```rust
//! use lodestone::persistent::SharedTree;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let tree: Arc<SharedTree<u32>> = Arc::new(SharedTree::new());
//! let writer = {
//!     let tree = Arc::clone(&tree);
//!     thread::spawn(move || (0..100).for_each(|key| { tree.insert(key); }))
//! };
//! writer.join().unwrap();
//!
//! let snapshot = tree.snapshot();
//! assert_eq!(snapshot.leaf_keys().count(), 100);
//! ```

use super::btree::{BTree, DEFAULT_MAX_KEYS};
use super::node::NodeRef;
use parking_lot::{Mutex, RwLock};
use std::borrow::Borrow;
use std::fmt;

/// A [`BTree`] shared between threads.
///
/// Inserts are serialised; snapshots are lock-free apart from a short read
/// lock around the root handle.
pub struct SharedTree<K, const MAX_KEYS: usize = DEFAULT_MAX_KEYS> {
    writer: Mutex<BTree<K, MAX_KEYS>>,
    published: RwLock<NodeRef<K>>,
}

impl<K, const MAX_KEYS: usize> SharedTree<K, MAX_KEYS> {
    /// Creates an empty shared tree.
    #[must_use]
    pub fn new() -> Self {
        Self::from_tree(BTree::new())
    }

    /// Shares an existing tree, publishing its current version.
    #[must_use]
    pub fn from_tree(tree: BTree<K, MAX_KEYS>) -> Self {
        let published = RwLock::new(tree.current_snapshot());
        Self {
            writer: Mutex::new(tree),
            published,
        }
    }

    /// Returns the root of the latest published version.
    #[must_use]
    pub fn snapshot(&self) -> NodeRef<K> {
        NodeRef::clone(&self.published.read())
    }

    /// Returns the number of published versions after the initial one.
    ///
    /// Waits for an insert in flight to finish.
    #[must_use]
    pub fn version(&self) -> usize {
        self.writer.lock().version()
    }

    /// Returns `true` if the latest published version holds `key`.
    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.snapshot().contains(key)
    }

    /// Unwraps the tree, including its full history.
    #[must_use]
    pub fn into_tree(self) -> BTree<K, MAX_KEYS> {
        self.writer.into_inner()
    }
}

impl<K: Ord + Clone, const MAX_KEYS: usize> SharedTree<K, MAX_KEYS> {
    /// Inserts `value` and publishes the resulting version.
    ///
    /// Returns `false`, publishing nothing, if `value` was already present.
    pub fn insert(&self, value: K) -> bool {
        let mut tree = self.writer.lock();
        let inserted = tree.insert(value);
        if inserted {
            *self.published.write() = tree.current_snapshot();
        }
        inserted
    }
}

impl<K, const MAX_KEYS: usize> Default for SharedTree<K, MAX_KEYS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, const MAX_KEYS: usize> fmt::Debug for SharedTree<K, MAX_KEYS> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        formatter
            .debug_struct("SharedTree")
            .field("max_keys", &MAX_KEYS)
            .field("keys", &snapshot.leaf_keys().collect::<Vec<_>>())
            .finish()
    }
}

static_assertions::assert_impl_all!(SharedTree<i32>: Send, Sync);
static_assertions::assert_impl_all!(BTree<String>: Send, Sync);
