//! Splitting a forest at a leaf boundary.
//!
//! Each side of the cut is rebuilt by replaying the classification of the
//! nodes along the cut. On the left side, the node at the cut is now the
//! right end of its level and therefore open to becoming a right fringe; the
//! replay decides, from the node's output bits and the round it originally
//! merged or became a fringe in, whether it still merges with the same
//! partner (climb to the parent) or becomes a fringe (continue with its
//! neighbour on the same level). The right side is the mirror image.
//!
//! Everything away from the cut keeps its classification, so both halves
//! keep the nodes of the unsplit forest, in the same arena, and no hash is
//! recomputed. Only the nodes on the cut path change: demoted nodes and the
//! other new roots lose their parent, and the node next to the cut on each
//! level loses its link across it. Their old ancestors become garbage.
//! When equal-hash neighbours make the replay leave that reusable region, the
//! side is rebuilt from its leaf hashes instead.

use std::rc::Rc;

use splithash_framework::{CryptoHash, DIGEST_BITS, InvalidIndex, hash::output_bit};
use tracing::debug;

use crate::{
    error::{Error, Result},
    forest::SplitHash,
    node::{Arena, Attachment, NodeId},
    round::{Kind, classify},
};

/// The side of the cut being rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    /// The bit that turns the open end of this side into a fringe: `1` for
    /// a right fringe on the left side, `0` for a left fringe on the right.
    fn demotion_bit(self) -> bool {
        self == Side::Left
    }

    /// Neighbour of `id` on its level, walking away from the cut.
    fn neighbour(self, arena: &Arena, id: NodeId) -> Option<NodeId> {
        match self {
            Side::Left => arena[id].prev,
            Side::Right => arena[id].next,
        }
    }
}

/// How a node was classified when the unsplit forest was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    /// Merged in round `round` with the neighbour lying towards `partner`.
    Merged { partner: Side, round: usize },
    /// Got a single-child parent.
    Orphan,
    /// Became a fringe on `edge` in round `round`.
    Fringe { edge: Side, round: usize },
}

/// Read-only outcome of replaying one side of the cut.
#[derive(Debug, Default)]
struct Replay {
    /// Level on which the replay stopped: the height of the new forest.
    height: usize,
    /// Nodes turned into fringes, per level, in the order they were reached
    /// (moving away from the cut).
    demoted: Vec<Vec<NodeId>>,
    /// Fringe node on `height` that kept its original classification. The
    /// nodes beyond it on that level keep theirs as well.
    kept: Option<NodeId>,
    /// First node reached on each level: the one next to the cut.
    frontier: Vec<NodeId>,
}

#[derive(Debug)]
enum Plan {
    Replay(Replay),
    Rebuild,
}

/// One side of the cut, laid out on the nodes of the unsplit forest.
#[derive(Debug)]
struct Layout {
    height: usize,
    left_fringes: Vec<Vec<NodeId>>,
    right_fringes: Vec<Vec<NodeId>>,
    top: Vec<NodeId>,
    /// Node next to the cut on every level up to `height`.
    frontier: Vec<NodeId>,
}

#[derive(Debug)]
enum Half {
    Reuse(Layout),
    /// Leaf hashes of the side, in order.
    Rebuild(Vec<CryptoHash>),
}

impl SplitHash {
    /// Split into the blocks before `index` and the blocks from `index` on.
    ///
    /// `split(0)` returns `(empty, self)` and `split(len)` returns
    /// `(self, empty)`. The forest is consumed; the halves share its arena.
    pub fn split(self, index: usize) -> Result<(Self, Self)> {
        let len = self.len();
        InvalidIndex::check_cut(index, len)?;
        if index == 0 {
            return Ok((Self::default(), self));
        }
        if index == len {
            return Ok((self, Self::default()));
        }

        // Both sides are worked out before either one touches the arena.
        let left = self.half(Side::Left, index - 1)?;
        let right = self.half(Side::Right, index)?;

        let left = self.build(Side::Left, left, index)?;
        let right = self.build(Side::Right, right, len - index)?;

        debug!(
            len,
            index,
            left_height = left.height,
            right_height = right.height,
            "split forest"
        );
        Ok((left, right))
    }

    /// Work out the side of the cut whose leaf next to the cut is `start`.
    fn half(&self, side: Side, start: usize) -> Result<Half> {
        let start_leaf = {
            let arena = self.arena();
            self.locate(&arena, start).map(|(_, leaf)| leaf)
        }
        .ok_or(InvalidIndex {
            index: start,
            len: self.len,
        })?;

        if let Plan::Replay(replay) = self.plan(side, start_leaf)? {
            if let Some(layout) = self.layout(side, replay, start_leaf) {
                return Ok(Half::Reuse(layout));
            }
        }
        Ok(Half::Rebuild(self.leaf_run(side, start_leaf)))
    }

    fn plan(&self, side: Side, start: NodeId) -> Result<Plan> {
        let arena = self.arena();
        let demote = side.demotion_bit();
        let mut replay = Replay::default();
        let mut node = start;
        let mut from = 0;

        loop {
            let level = arena[node].level;
            if replay.demoted.len() <= level {
                replay.demoted.resize_with(level + 1, Vec::new);
            }
            if replay.frontier.len() <= level {
                replay.frontier.push(node);
            }
            let Some(fate) = self.fate(node)? else {
                return Ok(Plan::Rebuild);
            };

            let demoted_at = match fate {
                Fate::Merged { partner, round } if partner == side => {
                    // Still merges in `round` unless it turns into a fringe
                    // first.
                    match first_bit(arena[node].hash, demote, from, Some(round + 1), level)? {
                        Some(idx) => idx,
                        None => {
                            let Some(parent) = arena[node].parent else {
                                return Ok(Plan::Rebuild);
                            };
                            node = parent;
                            from = 0;
                            continue;
                        }
                    }
                }
                Fate::Merged { round, .. } => {
                    // The partner is gone; the node must become a fringe no
                    // later than the round it used to merge in.
                    if from > round {
                        return Ok(Plan::Rebuild);
                    }
                    match first_bit(arena[node].hash, demote, from, Some(round + 1), level)? {
                        Some(idx) => idx,
                        None => return Ok(Plan::Rebuild),
                    }
                }
                Fate::Orphan => required_bit(arena[node].hash, demote, from, level)?,
                Fate::Fringe { edge, .. } if edge != side => {
                    required_bit(arena[node].hash, demote, from, level)?
                }
                Fate::Fringe { round, .. } => {
                    match first_bit(arena[node].hash, demote, from, Some(round), level)? {
                        Some(idx) => idx,
                        None => {
                            replay.height = level;
                            replay.kept = Some(node);
                            return Ok(Plan::Replay(replay));
                        }
                    }
                }
            };

            replay.demoted[level].push(node);
            match side.neighbour(&arena, node) {
                Some(neighbour) => {
                    node = neighbour;
                    from = demoted_at + 1;
                }
                None => {
                    replay.height = level;
                    return Ok(Plan::Replay(replay));
                }
            }
        }
    }

    /// Classification `id` received when this forest was built, or `None` if
    /// the forest does not account for it.
    fn fate(&self, id: NodeId) -> Result<Option<Fate>> {
        let arena = self.arena();
        let merged = |partner| {
            arena[id]
                .bitcount
                .map(|round| Fate::Merged { partner, round })
        };
        match arena.attachment(id) {
            Attachment::Single => return Ok(Some(Fate::Orphan)),
            Attachment::Left => return Ok(merged(Side::Right)),
            Attachment::Right => return Ok(merged(Side::Left)),
            Attachment::Root => {}
        }

        let level = arena[id].level;
        if level == self.height {
            let Some(position) = self.top.iter().position(|&t| t == id) else {
                return Ok(None);
            };
            let hashes: Vec<_> = self.top.iter().map(|&t| arena[t].hash).collect();
            let classification = classify(&hashes, true, true, level)?;
            let round = classification.rounds[position];
            return Ok(match classification.kinds[position] {
                Kind::LeftFringe => Some(Fate::Fringe {
                    edge: Side::Left,
                    round,
                }),
                Kind::RightFringe => Some(Fate::Fringe {
                    edge: Side::Right,
                    round,
                }),
                _ => None,
            });
        }

        let (Some(left), Some(right)) = (
            self.left_fringes.get(level),
            self.right_fringes.get(level),
        ) else {
            return Ok(None);
        };
        if let Some(position) = left.iter().position(|&f| f == id) {
            let rounds = self.fringe_rounds(left.iter().copied(), false, level)?;
            return Ok(Some(Fate::Fringe {
                edge: Side::Left,
                round: rounds[position],
            }));
        }
        if let Some(position) = right.iter().rev().position(|&f| f == id) {
            let rounds = self.fringe_rounds(right.iter().rev().copied(), true, level)?;
            return Ok(Some(Fate::Fringe {
                edge: Side::Right,
                round: rounds[position],
            }));
        }
        Ok(None)
    }

    /// Rounds at which a fringe list was peeled off its end, listed from the
    /// outermost node inwards. Each node reaches the end of the level the
    /// round after its predecessor left, and leaves on its first `bit`.
    fn fringe_rounds(
        &self,
        outermost_first: impl Iterator<Item = NodeId>,
        bit: bool,
        level: usize,
    ) -> Result<Vec<usize>> {
        let mut rounds = Vec::new();
        let mut from = 0;
        for id in outermost_first {
            let round = required_bit(self.arena()[id].hash, bit, from, level)?;
            rounds.push(round);
            from = round + 1;
        }
        Ok(rounds)
    }

    fn build(&self, side: Side, half: Half, len: usize) -> Result<Self> {
        match half {
            Half::Reuse(layout) => Ok(self.detach(side, layout, len)),
            Half::Rebuild(hashes) => {
                debug!(?side, leaves = hashes.len(), "rebuilding split side from leaves");
                Self::from_leaf_hashes(&hashes)
            }
        }
    }

    /// Leaf hashes from `start` to the far end of the forest on `side`, in
    /// sequence order.
    fn leaf_run(&self, side: Side, start: NodeId) -> Vec<CryptoHash> {
        let arena = self.arena();
        let mut hashes = Vec::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            hashes.push(arena[id].hash);
            cursor = side.neighbour(&arena, id);
        }
        if side == Side::Left {
            hashes.reverse();
        }
        hashes
    }

    /// Lay out one side from its replay. Returns `None` if the roots do not
    /// hold exactly the leaves from `start` to the end of the forest on
    /// `side`.
    fn layout(&self, side: Side, replay: Replay, start: NodeId) -> Option<Layout> {
        let arena = self.arena();
        let Replay {
            height,
            mut demoted,
            kept,
            frontier,
        } = replay;
        demoted.resize_with(height + 1, Vec::new);

        // Fringes on the far side of the cut keep their lists below `height`.
        let mut kept_fringes = Vec::with_capacity(height);
        for level in 0..height {
            let fringes = match side {
                Side::Left => self.left_fringes.get(level),
                Side::Right => self.right_fringes.get(level),
            };
            kept_fringes.push(fringes?.clone());
        }

        // On `height`, the kept node and everything beyond it, moving away
        // from the cut.
        let mut kept_top = Vec::new();
        let mut cursor = kept;
        while let Some(id) = cursor {
            kept_top.push(id);
            cursor = side.neighbour(&arena, id);
        }

        let mut top_demoted = demoted.pop().unwrap_or_default();
        let (left_fringes, right_fringes, top) = match side {
            Side::Left => {
                kept_top.reverse();
                top_demoted.reverse();
                kept_top.extend(top_demoted);
                let right_fringes = demoted
                    .into_iter()
                    .map(|mut level| {
                        level.reverse();
                        level
                    })
                    .collect();
                (kept_fringes, right_fringes, kept_top)
            }
            Side::Right => {
                top_demoted.extend(kept_top);
                (demoted, kept_fringes, top_demoted)
            }
        };

        let roots: Vec<NodeId> = left_fringes
            .iter()
            .flatten()
            .chain(&top)
            .chain(right_fringes.iter().rev().flatten())
            .copied()
            .collect();
        let sound = frontier.len() == height + 1
            && covers(&arena, side, &roots, start)
            && frontier_is_innermost(&arena, side, &roots, &frontier);
        sound.then_some(Layout {
            height,
            left_fringes,
            right_fringes,
            top,
            frontier,
        })
    }

    /// Make `layout` a forest of its own on the shared arena. Its roots
    /// lose their parent and merge round, and its frontier loses the links
    /// across the cut.
    fn detach(&self, side: Side, layout: Layout, len: usize) -> Self {
        let Layout {
            height,
            left_fringes,
            right_fringes,
            top,
            frontier,
        } = layout;
        let half = SplitHash {
            arena: Rc::clone(&self.arena),
            height,
            left_fringes,
            right_fringes,
            top,
            len,
        };

        let mut arena = self.arena.borrow_mut();
        for root in half.spatial_roots() {
            let node = &mut arena[root];
            node.parent = None;
            node.bitcount = None;
        }
        for id in frontier {
            match side {
                Side::Left => arena[id].next = None,
                Side::Right => arena[id].prev = None,
            }
        }
        drop(arena);
        half
    }
}

/// Whether `roots`, left to right, hold exactly the leaves from the far end
/// of the forest on `side` up to and including `start`. Reads the level-0
/// links of the unsplit forest.
fn covers(arena: &Arena, side: Side, roots: &[NodeId], start: NodeId) -> bool {
    let spans: Vec<(NodeId, NodeId)> = roots
        .iter()
        .map(|&root| (arena.leftmost_at(root, 0), arena.rightmost_at(root, 0)))
        .collect();
    let (Some(&(first, _)), Some(&(_, last))) = (spans.first(), spans.last()) else {
        return false;
    };
    let joined = spans
        .windows(2)
        .all(|pair| arena[pair[0].1].next == Some(pair[1].0));
    joined
        && match side {
            Side::Left => arena[first].prev.is_none() && last == start,
            Side::Right => first == start && arena[last].next.is_none(),
        }
}

/// Whether each `frontier` node is the node of `roots` closest to the cut
/// on its level.
fn frontier_is_innermost(
    arena: &Arena,
    side: Side,
    roots: &[NodeId],
    frontier: &[NodeId],
) -> bool {
    frontier.iter().enumerate().all(|(level, &id)| {
        let innermost = match side {
            Side::Left => roots
                .iter()
                .rev()
                .find(|&&root| arena[root].level >= level)
                .map(|&root| arena.rightmost_at(root, level)),
            Side::Right => roots
                .iter()
                .find(|&&root| arena[root].level >= level)
                .map(|&root| arena.leftmost_at(root, level)),
        };
        innermost == Some(id)
    })
}

/// First round in `from..until` (unbounded if `until` is `None`) at which
/// output bit of `hash` equals `bit`.
fn first_bit(
    hash: CryptoHash,
    bit: bool,
    from: usize,
    until: Option<usize>,
    level: usize,
) -> Result<Option<usize>> {
    let until = until.unwrap_or(DIGEST_BITS + 1);
    for idx in from..until {
        match output_bit(&hash, idx) {
            Some(b) if b == bit => return Ok(Some(idx)),
            Some(_) => {}
            None => {
                return Err(Error::DigestExhausted {
                    level,
                    bit_index: idx,
                });
            }
        }
    }
    Ok(None)
}

/// First round from `from` on at which output bit of `hash` equals `bit`.
fn required_bit(
    hash: CryptoHash,
    bit: bool,
    from: usize,
    level: usize,
) -> Result<usize> {
    first_bit(hash, bit, from, None, level)?.ok_or(Error::DigestExhausted {
        level,
        bit_index: DIGEST_BITS,
    })
}
