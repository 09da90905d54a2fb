//! Persistent (copy-on-write) multiway search tree.
//!
//! This module provides [`BTree`], an ordered index over bare keys in which
//! every insert publishes a new version and keeps all earlier ones:
//!
//! - [`BTree`]: the versioned tree and its append-only history
//! - [`Node`] / [`NodeRef`]: read-only view of any version's nodes
//! - [`Rendered`] / [`RenderedHistory`]: text dumps for debugging
//! - [`InvariantViolation`]: structural validation errors
//! - `SharedTree`: concurrent readers, one writer (`arc` feature)
//!
//! # Structural Sharing
//!
//! An insert clones only the nodes on the path from the root to the leaf
//! that receives the key. Every other subtree is shared, by handle, between
//! the old and the new version.
//!
//! ```rust
//! use lodestone::persistent::BTree;
//!
//! let mut tree: BTree<i32> = (1..=6).collect();
//! let before = tree.current_snapshot();
//! tree.insert(0);
//! let after = tree.current_snapshot();
//!
//! // The right half of the tree was not on the insertion path.
//! assert!(std::ptr::eq(&*before.children()[1], &*after.children()[1]));
//! // The left half was cloned.
//! assert!(!std::ptr::eq(&*before.children()[0], &*after.children()[0]));
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod btree;
mod node;
mod render;
#[cfg(feature = "arc")]
mod shared;
mod validate;

pub use btree::BTree;
pub use btree::DEFAULT_MAX_KEYS;
pub use node::LeafKeys;
pub use node::Node;
pub use node::NodeId;
pub use node::NodeRef;
pub use render::Rendered;
pub use render::RenderedHistory;
#[cfg(feature = "arc")]
pub use shared::SharedTree;
pub use validate::InvariantViolation;
pub use validate::validate;

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(BTree<i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
