//! The round classifier.
//!
//! A list of same-level nodes is partitioned round by round, using output
//! bit `idx` of each hash in round `idx`:
//!
//! 1. a volatile left end whose bit is `0` becomes a left fringe,
//! 2. a volatile right end whose bit is `1` becomes a right fringe,
//! 3. adjacent unclassified nodes merge when their hashes are equal or their
//!    bits read `1, 0`.
//!
//! Rounds continue until no node can still change. Nodes left unclassified
//! get a single-child parent.

use splithash_framework::{
    CryptoHash,
    hash::{hash_pair, output_bit},
};
use tracing::trace;

use crate::{
    error::{Error, Result},
    node::{Arena, NodeId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Unknown,
    MergeLeft,
    MergeRight,
    LeftFringe,
    RightFringe,
}

/// Outcome of classifying one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Classification {
    pub kinds: Vec<Kind>,
    /// Round at which each node was classified. For nodes left
    /// [`Kind::Unknown`] this is the last round played.
    pub rounds: Vec<usize>,
}

/// Classify `hashes`, the nodes of `level` in left-to-right order.
///
/// Pure function of the hashes and the volatility of both ends.
pub(crate) fn classify(
    hashes: &[CryptoHash],
    volatile_left: bool,
    volatile_right: bool,
    level: usize,
) -> Result<Classification> {
    let n = hashes.len();
    let mut kinds = vec![Kind::Unknown; n];
    let mut rounds = vec![0; n];
    let bit = |i: usize, idx: usize| {
        output_bit(&hashes[i], idx).ok_or(Error::DigestExhausted {
            level,
            bit_index: idx,
        })
    };

    // `left` is the first position still open to the left fringe, `right`
    // one past the last position open to the right fringe.
    let mut left = 0;
    let mut right = n;
    let mut idx = 0;
    loop {
        let mut done = true;

        if volatile_left {
            if left < n && kinds[left] == Kind::Unknown && !bit(left, idx)? {
                kinds[left] = Kind::LeftFringe;
                rounds[left] = idx;
                left += 1;
            }
            if left < n && kinds[left] == Kind::Unknown {
                done = false;
            }
        }

        if volatile_right {
            if right > 0 && kinds[right - 1] == Kind::Unknown && bit(right - 1, idx)? {
                kinds[right - 1] = Kind::RightFringe;
                rounds[right - 1] = idx;
                right -= 1;
            }
            if right > 0 && kinds[right - 1] == Kind::Unknown {
                done = false;
            }
        }

        for j in 0..n.saturating_sub(1) {
            if kinds[j] != Kind::Unknown || kinds[j + 1] != Kind::Unknown {
                continue;
            }
            if hashes[j] == hashes[j + 1] || (bit(j, idx)? && !bit(j + 1, idx)?) {
                kinds[j] = Kind::MergeLeft;
                kinds[j + 1] = Kind::MergeRight;
                rounds[j] = idx;
                rounds[j + 1] = idx;
            } else {
                done = false;
            }
        }

        if done {
            break;
        }
        idx += 1;
    }

    for (kind, round) in kinds.iter().zip(rounds.iter_mut()) {
        if *kind == Kind::Unknown {
            *round = idx;
        }
    }

    trace!(
        level,
        size = n,
        volatile_left,
        volatile_right,
        rounds = idx + 1,
        "classified level"
    );
    Ok(Classification { kinds, rounds })
}

/// Nodes produced by one round of classification.
#[derive(Debug, Default)]
pub(crate) struct RoundResult {
    /// Parents on the next level, in order.
    pub center: Vec<NodeId>,
    pub left_fringe: Vec<NodeId>,
    pub right_fringe: Vec<NodeId>,
}

/// Classify `nodes` (all on `level`) and build their parents on `level + 1`.
///
/// Links the nodes as neighbours and records the merge round on every
/// merged node.
pub(crate) fn do_round(
    arena: &mut Arena,
    nodes: &[NodeId],
    volatile_left: bool,
    volatile_right: bool,
    level: usize,
) -> Result<RoundResult> {
    arena.link_all(nodes);

    let hashes: Vec<CryptoHash> = nodes.iter().map(|&id| arena[id].hash).collect();
    let Classification { kinds, rounds } =
        classify(&hashes, volatile_left, volatile_right, level)?;

    let mut result = RoundResult::default();
    let mut i = 0;
    while i < nodes.len() {
        match kinds[i] {
            Kind::Unknown => {
                result.center.push(arena.single_parent(nodes[i], level + 1));
            }
            Kind::MergeLeft => {
                let (left, right) = (nodes[i], nodes[i + 1]);
                arena[left].bitcount = Some(rounds[i]);
                arena[right].bitcount = Some(rounds[i + 1]);
                result.center.push(arena.pair_parent(left, right, level + 1));
                i += 1;
            }
            // Only reachable through the pair above.
            Kind::MergeRight => {}
            Kind::LeftFringe => result.left_fringe.push(nodes[i]),
            Kind::RightFringe => result.right_fringe.push(nodes[i]),
        }
        i += 1;
    }

    Ok(result)
}

/// Hashes of the parents a round with no volatile end builds over `hashes`,
/// without allocating nodes.
pub(crate) fn fold_level(hashes: &[CryptoHash], level: usize) -> Result<Vec<CryptoHash>> {
    let Classification { kinds, .. } = classify(hashes, false, false, level)?;

    let mut parents = Vec::with_capacity(hashes.len());
    let mut i = 0;
    while i < hashes.len() {
        if kinds[i] == Kind::MergeLeft {
            parents.push(hash_pair(&hashes[i], &hashes[i + 1]));
            i += 2;
        } else {
            parents.push(hashes[i]);
            i += 1;
        }
    }
    Ok(parents)
}
