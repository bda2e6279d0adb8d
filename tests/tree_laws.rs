//! Property-based tests for the red-black tree engine.
//!
//! Random sequences of insertions and removals are replayed against both the
//! tree and a sorted `Vec` model.

use proptest::prelude::*;
use red_black_tree::{NodeId, Tree};

#[derive(Debug, Clone)]
enum Operation {
    Insert(i16),
    /// Removes the live node at this position, modulo the number of live nodes.
    Remove(usize),
}

fn arbitrary_operations(max_size: usize) -> impl Strategy<Value = Vec<Operation>> {
    let operation = prop_oneof![
        3 => (-50i16..50).prop_map(Operation::Insert),
        2 => any::<usize>().prop_map(Operation::Remove),
    ];
    prop::collection::vec(operation, 0..max_size)
}

/// Replays `operations`, checking the tree against the model after each step.
fn replay(operations: &[Operation]) -> Result<(Tree<i16>, Vec<NodeId>), TestCaseError> {
    let mut tree = Tree::new();
    let mut live: Vec<NodeId> = Vec::new();
    let mut model: Vec<i16> = Vec::new();

    for operation in operations {
        match operation {
            Operation::Insert(key) => {
                live.push(tree.insert_key(*key).unwrap());
                model.push(*key);
            }
            Operation::Remove(position) => {
                if live.is_empty() {
                    continue;
                }
                let node = live.swap_remove(position % live.len());
                tree.remove(node).unwrap();
                let key = tree.release(node).unwrap();
                let at = model.iter().position(|existing| *existing == key).unwrap();
                model.swap_remove(at);
            }
        }

        prop_assert!(tree.validate().is_ok(), "{:?}", tree.validate());
        model.sort_unstable();
        let keys: Vec<i16> = tree.iter().map(|(_, key)| *key).collect();
        prop_assert_eq!(&keys, &model);
        prop_assert_eq!(tree.len(), model.len());
    }
    Ok((tree, live))
}

proptest! {
    /// Invariants 1-6 hold after every insertion and removal, and the in-order
    /// keys always equal the inserted keys minus the removed ones.
    #[test]
    fn prop_invariants_hold_after_every_operation(operations in arbitrary_operations(120)) {
        replay(&operations)?;
    }

    /// A tree with n nodes is never taller than 2 * log2(n + 1).
    #[test]
    fn prop_height_is_logarithmic(operations in arbitrary_operations(300)) {
        let (tree, _) = replay(&operations)?;
        let bound = 2.0 * ((tree.len() + 1) as f64).log2();
        prop_assert!(
            tree.height() as f64 <= bound,
            "height {} for {} nodes",
            tree.height(),
            tree.len()
        );
    }

    /// Neighbours in key order are each other's successor and predecessor.
    #[test]
    fn prop_successor_predecessor_duality(operations in arbitrary_operations(100)) {
        let (tree, _) = replay(&operations)?;
        let ordered: Vec<NodeId> = tree.iter().map(|(node, _)| node).collect();
        for pair in ordered.windows(2) {
            prop_assert_eq!(tree.successor(pair[0]).unwrap(), Some(pair[1]));
            prop_assert_eq!(tree.predecessor(pair[1]).unwrap(), Some(pair[0]));
        }
        prop_assert_eq!(tree.minimum(tree.root()).ok(), ordered.first().copied());
        prop_assert_eq!(tree.maximum(tree.root()).ok(), ordered.last().copied());
    }

    /// Every live node is reachable, including equal keys moved around by rotations.
    #[test]
    fn prop_every_live_node_is_found(operations in arbitrary_operations(100)) {
        let (tree, live) = replay(&operations)?;
        for node in live {
            prop_assert!(tree.contains_node(node));
        }
    }

    /// Deleting by key removes exactly one matching entry.
    #[test]
    fn prop_delete_removes_one_entry(
        inserted in prop::collection::vec(-10i16..10, 0..60),
        key in -10i16..10
    ) {
        let mut tree = Tree::new();
        for existing in &inserted {
            tree.insert_key(*existing).unwrap();
        }
        let before = inserted.iter().filter(|existing| **existing == key).count();

        let deleted = tree.delete(&key);

        prop_assert_eq!(deleted.is_some(), before > 0);
        let after = tree.iter().filter(|(_, existing)| **existing == key).count();
        prop_assert_eq!(after, before.saturating_sub(1));
        prop_assert!(tree.validate().is_ok());
    }
}
