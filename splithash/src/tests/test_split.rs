use std::rc::Rc;

use assert_matches::assert_matches;
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use splithash_framework::{Block, InvalidIndex};

use super::{assert_hashes_consistent, counting_blocks, counting_forest};
use crate::{
    Error, SplitHash,
    forest::SPARSE_FACTOR,
    node::NodeId,
    test_utils::{
        int_blocks, levels_are_linked, merge_rounds_are_consistent, random_int_blocks,
        random_merge, shuffled_cuts,
    },
    verify,
};

/// Both halves of `forest.split(cut)` must equal `create` over the same
/// blocks, and merging them back must restore `create` over all of them.
fn check_split(forest: SplitHash, blocks: &[impl Block], cut: usize) {
    let (left, right) = forest.split(cut).expect("split");

    let expected_left = SplitHash::create(&blocks[..cut]).expect("create");
    let expected_right = SplitHash::create(&blocks[cut..]).expect("create");
    assert_eq!(left.shape(), expected_left.shape(), "left of {cut}");
    assert_eq!(right.shape(), expected_right.shape(), "right of {cut}");
    assert_eq!(left.leaf_hashes(), expected_left.leaf_hashes());
    assert_eq!(right.leaf_hashes(), expected_right.leaf_hashes());
    assert!(levels_are_linked(&left), "left of {cut}");
    assert!(levels_are_linked(&right), "right of {cut}");
    assert!(merge_rounds_are_consistent(&left), "left of {cut}");
    assert!(merge_rounds_are_consistent(&right), "right of {cut}");

    let merged = SplitHash::merge(left, right).expect("merge");
    let expected = SplitHash::create(blocks).expect("create");
    assert_eq!(merged.shape(), expected.shape(), "merge back at {cut}");
}

// ── Degenerate cuts ────────────────────────────────────────────────────

#[test]
fn test_split_at_zero() {
    let expected = counting_forest(33).shape();
    let (left, right) = counting_forest(33).split(0).expect("split");
    assert!(left.is_empty());
    assert_eq!(right.shape(), expected);
}

#[test]
fn test_split_at_len() {
    let expected = counting_forest(33).shape();
    let (left, right) = counting_forest(33).split(33).expect("split");
    assert_eq!(left.shape(), expected);
    assert!(right.is_empty());
}

#[test]
fn test_split_empty_forest() {
    let (left, right) = SplitHash::new().split(0).expect("split");
    assert!(left.is_empty());
    assert!(right.is_empty());
}

#[test]
fn test_split_past_end_is_rejected() {
    assert_matches!(
        counting_forest(10).split(11),
        Err(Error::InvalidIndex(InvalidIndex { index: 11, len: 10 }))
    );
    assert_matches!(
        SplitHash::new().split(1),
        Err(Error::InvalidIndex(InvalidIndex { index: 1, len: 0 }))
    );
}

// ── Every cut of small sequences ───────────────────────────────────────

#[test]
fn test_split_every_cut_of_static_sequences() {
    for len in 1..=64 {
        let blocks = counting_blocks(len);
        for cut in 0..=len {
            let forest = SplitHash::create(&blocks).expect("create");
            check_split(forest, &blocks, cut);
        }
    }
}

#[test]
fn test_split_two_blocks() {
    let blocks = int_blocks(&[289, 27]);
    for cut in 0..=2 {
        check_split(SplitHash::create(&blocks).expect("create"), &blocks, cut);
    }
}

// ── Random sequences ───────────────────────────────────────────────────

#[test]
fn test_split_forests_built_by_random_merges() {
    let mut rng = SmallRng::seed_from_u64(3);
    for _ in 0..40 {
        let len = rng.gen_range(2..300);
        let blocks = random_int_blocks(&mut rng, len);
        let cut = rng.gen_range(0..=len);
        let forest = random_merge(&mut rng, &blocks).expect("merge");
        check_split(forest, &blocks, cut);
    }
}

#[test]
fn test_cut_into_pieces_and_reassemble() {
    let mut rng = SmallRng::seed_from_u64(11);
    let blocks = random_int_blocks(&mut rng, 1000);
    let expected = SplitHash::create(&blocks).expect("create").shape();

    // Pieces as (start, forest), kept in order.
    let mut pieces = vec![(0, SplitHash::create(&blocks).expect("create"))];
    for cut in shuffled_cuts(&mut rng, blocks.len()).into_iter().take(40) {
        let position = pieces
            .iter()
            .rposition(|(start, _)| *start <= cut)
            .expect("first piece starts at zero");
        let (start, forest) = pieces.remove(position);
        let (left, right) = forest.split(cut - start).expect("split");
        assert_eq!(left.len() + start, cut);

        let end = start + left.len() + right.len();
        let expected_right = SplitHash::create(&blocks[cut..end]).expect("create");
        assert_eq!(right.shape(), expected_right.shape());

        pieces.insert(position, (cut, right));
        pieces.insert(position, (start, left));
    }

    let mut forest = SplitHash::new();
    for (_, piece) in pieces {
        assert!(levels_are_linked(&piece));
        forest = SplitHash::merge(forest, piece).expect("merge");
    }
    assert_eq!(forest.shape(), expected);
}

#[test]
fn test_split_halves_are_well_formed() {
    let mut rng = SmallRng::seed_from_u64(5);
    let blocks = random_int_blocks(&mut rng, 500);
    for cut in shuffled_cuts(&mut rng, 500).into_iter().take(30) {
        let (left, right) = SplitHash::create(&blocks)
            .expect("create")
            .split(cut)
            .expect("split");
        assert_hashes_consistent(&left);
        assert_hashes_consistent(&right);
        assert_eq!(left.len(), cut);
        assert_eq!(right.len(), 500 - cut);
    }
}

// ── Arena reuse ────────────────────────────────────────────────────────

/// Parent, merge round and level links of one node.
type NodeLinks = (Option<NodeId>, Option<usize>, Option<NodeId>, Option<NodeId>);

/// Links of every node in the arena of `forest`, dead or alive.
fn arena_links(forest: &SplitHash) -> Vec<NodeLinks> {
    let arena = forest.arena();
    arena
        .ids()
        .map(|id| {
            let node = &arena[id];
            (node.parent, node.bitcount, node.prev, node.next)
        })
        .collect()
}

#[test]
fn test_split_off_one_leaf_touches_only_the_cut_path() {
    let len = 20_000;
    let forest = counting_forest(len);
    let before = arena_links(&forest);

    let (left, right) = forest.split(len - 1).expect("split");
    assert!(Rc::ptr_eq(&left.arena, &right.arena));
    assert_eq!(right.len(), 1);

    let after = arena_links(&left);
    assert_eq!(after.len(), before.len(), "split allocated nodes");
    let touched = before.iter().zip(&after).filter(|(old, new)| old != new).count();
    assert!(touched > 0);
    assert!(touched < len / 50, "split touched {touched} nodes");
    assert!(levels_are_linked(&left));
    assert!(levels_are_linked(&right));
    assert!(merge_rounds_are_consistent(&left));

    let merged = SplitHash::merge(left, right).expect("merge");
    let grown = merged.arena().len() - before.len();
    assert!(grown < len / 50, "merge allocated {grown} nodes");
    assert_eq!(merged.shape(), counting_forest(len).shape());
}

#[test]
fn test_repeated_split_and_merge_keeps_arena_bounded() {
    let len = 2000;
    let mut forest = counting_forest(len);
    for step in 0..400 {
        let cut = step * 37 % (len - 1) + 1;
        let (left, right) = forest.split(cut).expect("split");
        forest = SplitHash::merge(left, right).expect("merge");
        assert!(
            forest.arena().len() <= SPARSE_FACTOR * forest.live_nodes(),
            "step {step}"
        );
    }
    assert_eq!(forest.shape(), counting_forest(len).shape());
    assert!(levels_are_linked(&forest));
}

#[test]
fn test_halves_merge_with_unrelated_forests() {
    let blocks = counting_blocks(300);
    let (left, right) = SplitHash::create(&blocks[..200])
        .expect("create")
        .split(120)
        .expect("split");
    let tail = SplitHash::create(&blocks[200..]).expect("create");

    let right = SplitHash::merge(right, tail).expect("merge");
    assert_eq!(right.shape(), SplitHash::create(&blocks[120..]).expect("create").shape());
    assert!(levels_are_linked(&right));

    let whole = SplitHash::merge(left.clone(), right).expect("merge");
    assert_eq!(whole.shape(), SplitHash::create(&blocks).expect("create").shape());
    assert_eq!(left.shape(), SplitHash::create(&blocks[..120]).expect("create").shape());
    assert!(!Rc::ptr_eq(&left.arena, &whole.arena));
}

// ── Repeated blocks ────────────────────────────────────────────────────

#[test]
fn test_split_with_repeated_blocks_keeps_proofs_valid() {
    // Equal neighbours merge on sight, which may force a rebuild of a side.
    let mut rng = SmallRng::seed_from_u64(17);
    for _ in 0..60 {
        let len = rng.gen_range(1..40);
        let values: Vec<i32> = (0..len).map(|_| rng.gen_range(0..3)).collect();
        let blocks = int_blocks(&values);
        let cut = rng.gen_range(0..=len);

        let (left, right) = SplitHash::create(&blocks)
            .expect("create")
            .split(cut)
            .expect("split");
        assert_eq!(left.len(), cut);
        assert_eq!(right.len(), len - cut);
        assert!(levels_are_linked(&left));
        assert!(levels_are_linked(&right));
        assert_hashes_consistent(&left);
        assert_hashes_consistent(&right);

        for (forest, part) in [(&left, &blocks[..cut]), (&right, &blocks[cut..])] {
            let authenticator = forest.authenticator();
            for (index, block) in part.iter().enumerate() {
                let proof = forest.proof(index).expect("proof");
                assert!(verify(block, &proof, &authenticator));
            }
        }
    }
}

proptest! {
    #[test]
    fn test_random_split(
        values in prop::collection::btree_set(any::<i32>(), 1..120),
        cut_seed in any::<usize>(),
    ) {
        let values: Vec<i32> = values.into_iter().collect();
        let blocks = int_blocks(&values);
        let cut = cut_seed % (blocks.len() + 1);
        check_split(SplitHash::create(&blocks).expect("create"), &blocks, cut);
    }
}
