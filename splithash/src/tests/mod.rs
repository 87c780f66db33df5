mod test_split;

use splithash_framework::{IntBlock, hash::hash_pair};

use crate::{SplitHash, test_utils::int_blocks};

/// `create` over the integers `0..len`.
fn counting_forest(len: usize) -> SplitHash {
    let values: Vec<i32> = (0..len as i32).collect();
    SplitHash::create(&int_blocks(&values)).expect("create")
}

/// Blocks `0..len` as integers.
fn counting_blocks(len: usize) -> Vec<IntBlock> {
    let values: Vec<i32> = (0..len as i32).collect();
    int_blocks(&values)
}

/// Every node hash agrees with its children and every level is one above
/// the children's.
fn assert_hashes_consistent(forest: &SplitHash) {
    let arena = forest.arena();
    for root in forest.spatial_roots() {
        for id in arena.preorder(root) {
            let node = &arena[id];
            match (node.left, node.right) {
                (Some(left), Some(right)) => {
                    let (left, right) = (&arena[left], &arena[right]);
                    assert_eq!(node.hash, hash_pair(&left.hash, &right.hash));
                    assert_eq!(left.level + 1, node.level);
                    assert_eq!(right.level + 1, node.level);
                }
                (Some(child), None) => {
                    let child = &arena[child];
                    assert_eq!(node.hash, child.hash);
                    assert_eq!(child.level + 1, node.level);
                }
                (None, None) => assert_eq!(node.level, 0),
                (None, Some(_)) => panic!("right child without left child"),
            }
        }
    }
}
