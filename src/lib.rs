//! # lodestone
//!
//! A persistent, copy-on-write multiway search tree that keeps every version.
//!
//! ## Overview
//!
//! Each insert into a [`BTree`](persistent::BTree) builds a new version of
//! the tree out of clones of the nodes on the insertion path, reuses every
//! other subtree, and appends the replaced root to an append-only history.
//! Any version, current or past, can be traversed, validated and rendered.
//!
//! - **Copy-on-write nodes**: published nodes are never mutated
//! - **Structural sharing**: untouched subtrees are shared by handle
//! - **Version history**: every earlier root stays reachable
//! - **Debug rendering**: indented text dumps of any version
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes through `Arc` instead of `Rc` and enable
//!   `SharedTree` for concurrent readers
//! - `serde`: serialize trees and node snapshots
//!
//! ## Example
//!
//! ```rust
//! use lodestone::prelude::*;
//!
//! let mut tree: BTree<i32> = BTree::new();
//! for key in [3, 5, 4] {
//!     tree.insert(key);
//! }
//!
//! assert_eq!(tree.current_snapshot().keys(), &[4]);
//! assert_eq!(tree.history().len(), 3);
//! assert_eq!(tree.validate(), Ok(()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use lodestone::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
}

pub mod persistent;
