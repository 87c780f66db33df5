use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use splithash_framework::IntBlock;

use crate::{Result, SplitHash};

/// Integer blocks for `values`.
pub fn int_blocks(values: &[i32]) -> Vec<IntBlock> {
    values.iter().copied().map(IntBlock::new).collect()
}

/// `count` random integer blocks, no two alike.
pub fn random_int_blocks<R: Rng>(rng: &mut R, count: usize) -> Vec<IntBlock> {
    let mut seen = HashSet::with_capacity(count);
    let mut blocks = Vec::with_capacity(count);
    while blocks.len() < count {
        let value: i32 = rng.r#gen();
        if seen.insert(value) {
            blocks.push(IntBlock::new(value));
        }
    }
    blocks
}

/// Build one forest per block, then merge randomly chosen adjacent forests
/// until a single one remains.
pub fn random_merge<R: Rng>(rng: &mut R, blocks: &[IntBlock]) -> Result<SplitHash> {
    let mut forests: Vec<SplitHash> = blocks.iter().map(SplitHash::from_block).collect();
    while forests.len() > 1 {
        let i = rng.gen_range(0..forests.len() - 1);
        let right = forests.remove(i + 1);
        let left = std::mem::take(&mut forests[i]);
        forests[i] = SplitHash::merge(left, right)?;
    }
    Ok(forests.pop().unwrap_or_default())
}

/// Cut points at which to split `len` blocks, in random order.
pub fn shuffled_cuts<R: Rng>(rng: &mut R, len: usize) -> Vec<usize> {
    let mut cuts: Vec<usize> = (0..=len).collect();
    cuts.shuffle(rng);
    cuts
}

/// Whether every level of `forest` is one `prev` / `next` chain covering
/// exactly the nodes of that level, left to right.
pub fn levels_are_linked(forest: &SplitHash) -> bool {
    let arena = forest.arena();
    forest.levels().iter().all(|level| {
        let ends_open = match (level.first(), level.last()) {
            (Some(&first), Some(&last)) => {
                arena[first].prev.is_none() && arena[last].next.is_none()
            }
            _ => true,
        };
        ends_open
            && level.windows(2).all(|pair| {
                arena[pair[0]].next == Some(pair[1])
                    && arena[pair[1]].prev == Some(pair[0])
            })
    })
}

/// Whether every merged node records a merge round and every root records
/// none.
pub fn merge_rounds_are_consistent(forest: &SplitHash) -> bool {
    let arena = forest.arena();
    forest.spatial_roots().all(|root| {
        arena.preorder(root).all(|id| {
            let node = &arena[id];
            let in_pair = node
                .parent
                .is_some_and(|parent| arena[parent].right.is_some());
            in_pair == node.bitcount.is_some()
        })
    })
}
