//! Scenario tests for the persistent BTree.
//!
//! Each test drives a tree through a concrete insert sequence and checks the
//! resulting shape, the version history and the sharing between versions.

use lodestone::persistent::{BTree, InvariantViolation, Node, NodeRef, Rendered};
use rstest::rstest;
use std::collections::HashSet;

// =============================================================================
// Helpers
// =============================================================================

/// Nested key lists of a subtree, ignoring node identifiers.
#[derive(Debug, PartialEq, Eq)]
struct Shape(Vec<i32>, Vec<Shape>);

fn shape(node: &Node<i32>) -> Shape {
    Shape(
        node.keys().to_vec(),
        node.children().iter().map(|child| shape(child)).collect(),
    )
}

fn leaf(keys: &[i32]) -> Shape {
    Shape(keys.to_vec(), Vec::new())
}

fn reachable(root: &NodeRef<i32>, nodes: &mut HashSet<*const Node<i32>>) {
    nodes.insert(NodeRef::as_ptr(root));
    for child in root.children() {
        reachable(child, nodes);
    }
}

fn tree_of(keys: &[i32]) -> BTree<i32> {
    keys.iter().copied().collect()
}

// =============================================================================
// Split Scenarios
// =============================================================================

#[rstest]
fn test_three_five_four_splits_root() {
    let tree = tree_of(&[3, 5, 4]);

    assert_eq!(
        shape(&tree.current_snapshot()),
        Shape(vec![4], vec![leaf(&[3]), leaf(&[4, 5])])
    );
    assert_eq!(tree.height(), 2);
}

#[rstest]
fn test_one_through_seven() {
    let tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);

    assert_eq!(tree.height(), 3);
    assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(
        shape(&tree.current_snapshot()),
        Shape(
            vec![3, 5],
            vec![
                Shape(vec![2], vec![leaf(&[1]), leaf(&[2])]),
                Shape(vec![4], vec![leaf(&[3]), leaf(&[4])]),
                Shape(vec![6], vec![leaf(&[5]), leaf(&[6, 7])]),
            ]
        )
    );
    assert_eq!(tree.validate(), Ok(()));
}

#[rstest]
fn test_one_through_five_grows_to_height_three() {
    let tree = tree_of(&[1, 2, 3, 4, 5]);
    let root = tree.current_snapshot();

    assert_eq!(tree.height(), 3);
    assert_eq!(root.keys(), &[3]);
    assert_eq!(
        shape(&root),
        Shape(
            vec![3],
            vec![
                Shape(vec![2], vec![leaf(&[1]), leaf(&[2])]),
                Shape(vec![4], vec![leaf(&[3]), leaf(&[4, 5])]),
            ]
        )
    );
}

#[rstest]
fn test_descending_inserts() {
    let tree = tree_of(&[7, 6, 5, 4, 3, 2, 1]);

    assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(tree.validate_history(), Ok(()));
}

#[rstest]
#[case(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])]
#[case(&[50, 10, 90, 30, 70, 20, 80, 40, 60])]
#[case(&[5, 1, 9, 3, 7, 2, 8, 4, 6, 0])]
fn test_every_version_is_valid(#[case] keys: &[i32]) {
    let tree = tree_of(keys);

    assert_eq!(tree.len(), keys.len());
    assert_eq!(tree.version(), keys.len());
    assert_eq!(tree.validate_history(), Ok(()));

    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    assert_eq!(tree.keys().copied().collect::<Vec<_>>(), sorted);
}

#[rstest]
fn test_wider_order_keeps_three_keys_per_node() {
    let tree: BTree<i32, 3> = (0..20).collect();

    assert_eq!(tree.validate(), Ok(()));
    let root = tree.current_snapshot();
    assert!(root.keys().len() <= 3);
    assert_eq!(tree.keys().count(), 20);
}

// =============================================================================
// Duplicate Handling
// =============================================================================

#[rstest]
fn test_duplicate_leaves_root_and_history_alone() {
    let mut tree = tree_of(&[1, 2, 3, 4, 5]);
    let root = tree.current_snapshot();
    let version = tree.version();

    for key in [1, 3, 5] {
        assert!(!tree.insert(key));
    }

    assert!(NodeRef::ptr_eq(&root, &tree.current_snapshot()));
    assert_eq!(tree.version(), version);
    assert_eq!(tree.len(), 5);
}

#[rstest]
fn test_separator_key_is_duplicate() {
    let mut tree = tree_of(&[3, 5, 4]);

    // 4 is both the root separator and a key of the right leaf.
    assert!(!tree.insert(4));
    assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
}

#[rstest]
fn test_repeated_inserts_match_single_inserts() {
    let keys = [9, 4, 7, 1, 8, 2, 6];
    let once = tree_of(&keys);
    let twice: BTree<i32> = keys.iter().flat_map(|&key| [key, key]).collect();

    assert_eq!(shape(&once.current_snapshot()), shape(&twice.current_snapshot()));
    assert_eq!(once.version(), twice.version());
}

// =============================================================================
// History and Sharing
// =============================================================================

#[rstest]
fn test_history_starts_with_initial_root() {
    let mut tree: BTree<i32> = BTree::new();
    let initial = tree.current_snapshot();

    for (count, key) in [10, 20, 30, 40].into_iter().enumerate() {
        tree.insert(key);
        assert_eq!(tree.history().len(), count + 1);
    }

    assert!(NodeRef::ptr_eq(&tree.history()[0], &initial));
    assert!(tree.history()[0].keys().is_empty());
}

#[rstest]
fn test_old_versions_are_unchanged() {
    let mut tree = tree_of(&[1, 2, 3]);
    let old = tree.current_snapshot();
    let old_shape = shape(&old);

    for key in 4..20 {
        tree.insert(key);
    }

    assert_eq!(shape(&old), old_shape);
    assert_eq!(old.leaf_keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[rstest]
fn test_snapshot_at_matches_history() {
    let tree = tree_of(&[4, 8, 2]);

    for (version, root) in tree.history().iter().enumerate() {
        let snapshot = tree.snapshot_at(version).expect("version exists");
        assert!(NodeRef::ptr_eq(snapshot, root));
    }
    let current = tree.snapshot_at(tree.version()).expect("current version");
    assert!(NodeRef::ptr_eq(current, &tree.current_snapshot()));
}

#[rstest]
fn test_insert_shares_off_path_subtrees() {
    let mut tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);
    let before = tree.current_snapshot();
    tree.insert(8);
    let after = tree.current_snapshot();

    // 8 lands in the rightmost subtree; the two left subtrees are reused.
    assert!(NodeRef::ptr_eq(&before.children()[0], &after.children()[0]));
    assert!(NodeRef::ptr_eq(&before.children()[1], &after.children()[1]));
    assert!(!NodeRef::ptr_eq(&before.children()[2], &after.children()[2]));
}

#[rstest]
fn test_insert_clones_only_the_path() {
    let mut tree: BTree<i32> = (0..64).map(|key| key * 2).collect();
    let before = tree.current_snapshot();
    let mut old_nodes = HashSet::new();
    reachable(&before, &mut old_nodes);

    tree.insert(33);
    let mut new_nodes = HashSet::new();
    reachable(&tree.current_snapshot(), &mut new_nodes);

    let fresh = new_nodes.difference(&old_nodes).count();
    assert!(fresh >= before.height());
    assert!(fresh <= 2 * before.height() + 1);
}

// =============================================================================
// Rendering
// =============================================================================

#[rstest]
fn test_render_after_split() {
    let tree = tree_of(&[3, 5, 4]);
    let root = tree.current_snapshot();
    let expected = format!(
        "({}) V:[4], C:[\n   ({}) V:[3], C:[\n   ],\n   ({}) V:[4, 5], C:[\n   ]\n]",
        root.id(),
        root.children()[0].id(),
        root.children()[1].id()
    );

    assert_eq!(Rendered::new(&root).to_string(), expected);
    assert_eq!(tree.to_string(), expected);
}

#[rstest]
fn test_render_history_lists_every_version() {
    let tree = tree_of(&[3, 5]);
    let rendered = tree.render_history().to_string();
    let lines: Vec<&str> = rendered.lines().filter(|line| line.starts_with("HIST: ")).collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("V:[], C:["));
    assert!(lines[2].ends_with("V:[3, 5], C:["));
}

#[rstest]
fn test_node_identifiers_are_per_tree() {
    let first = tree_of(&[1, 2]);
    let second = tree_of(&[1, 2]);

    assert_eq!(first.current_snapshot().id(), second.current_snapshot().id());
}

// =============================================================================
// Validation Errors
// =============================================================================

#[rstest]
fn test_invariant_violation_is_an_error() {
    let error: Box<dyn std::error::Error> = Box::new(InvariantViolation::UnsortedKeys {
        node: tree_of(&[1]).current_snapshot().id(),
    });
    assert!(error.to_string().contains("not strictly increasing"));
}

// =============================================================================
// Logging
// =============================================================================

mod logging {
    use super::tree_of;
    use rstest::rstest;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer poisoned").extend_from_slice(buffer);
            Ok(buffer.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    fn test_inserts_emit_events() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut tree = tree_of(&[3, 5, 4]);
            tree.insert(4);
        });

        let output = String::from_utf8(captured.0.lock().expect("log buffer poisoned").clone())
            .expect("log output is utf-8");
        assert!(output.contains("split overflowing node"));
        assert!(output.contains("root split, tree grew a level"));
        assert!(output.contains("published new version"));
        assert!(output.contains("duplicate key ignored"));
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
mod serde_support {
    use super::tree_of;
    use lodestone::persistent::BTree;
    use rstest::rstest;

    #[rstest]
    fn test_tree_serializes_as_sorted_keys() {
        let tree = tree_of(&[3, 5, 4, 1]);
        let json = serde_json::to_string(&tree).expect("serialize");
        assert_eq!(json, "[1,3,4,5]");
    }

    #[rstest]
    fn test_tree_deserializes_from_keys() {
        let tree: BTree<i32> = serde_json::from_str("[5,3,4,3]").expect("deserialize");
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(tree.version(), 3);
    }

    #[rstest]
    fn test_snapshot_serializes_nested_nodes() {
        let tree = tree_of(&[3, 5, 4]);
        let root = tree.current_snapshot();
        let value = serde_json::to_value(&*root).expect("serialize");

        assert_eq!(value["keys"], serde_json::json!([4]));
        assert_eq!(value["children"][0]["keys"], serde_json::json!([3]));
        assert_eq!(value["children"][1]["keys"], serde_json::json!([4, 5]));
        assert_eq!(value["children"][1]["children"], serde_json::json!([]));
    }
}
