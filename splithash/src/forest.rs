//! The SplitHash forest: construction, merge and read access.

use std::{
    cell::{Ref, RefCell},
    collections::HashMap,
    rc::Rc,
};

use splithash_framework::{AuthenticatedDataStructure, Block, CryptoHash, InvalidIndex};
use tracing::debug;

use crate::{
    authenticator::Authenticator,
    error::{Error, Result},
    node::{Arena, NodeId},
    proof::{Proof, Side},
    round::{do_round, fold_level},
    verify::verify,
};

/// A mergeable, splittable authenticated sequence.
///
/// Leaves are classified level by level into merge pairs and fringe nodes
/// (see [`crate::round`]). Fringe nodes stay parentless at the left or right
/// edge of the forest so that a later merge can pick them up again. The
/// roots, in order, are
///
/// `left_fringes[0], .., left_fringes[height - 1], top,
/// right_fringes[height - 1], .., right_fringes[0]`
///
/// while the authenticator lists them as left fringes (low to high), top,
/// right fringes (low to high).
///
/// The shape depends only on the leaf hashes: building a sequence at once,
/// or merging and splitting pieces of it, yields the same forest.
/// Garbage an arena may hold before a forest that owns it alone compacts
/// it, as a multiple of the forest's live nodes.
pub(crate) const SPARSE_FACTOR: usize = 4;

/// A mergeable, splittable authenticated sequence.
///
/// Leaves are classified level by level into merge pairs and fringe nodes
/// (see [`crate::round`]). Fringe nodes stay parentless at the left or right
/// edge of the forest so that a later merge can pick them up again. The
/// roots, in order, are
///
/// `left_fringes[0], .., left_fringes[height - 1], top,
/// right_fringes[height - 1], .., right_fringes[0]`
///
/// while the authenticator lists them as left fringes (low to high), top,
/// right fringes (low to high).
///
/// The shape depends only on the leaf hashes: building a sequence at once,
/// or merging and splitting pieces of it, yields the same forest.
///
/// Nodes live in an arena that the two halves of a split keep sharing, so
/// splitting only touches the nodes along the cut. Nodes no forest reaches
/// any more stay in the arena until a forest owning it alone finds it
/// mostly garbage and compacts it.
#[derive(Debug, Default)]
pub struct SplitHash {
    pub(crate) arena: Rc<RefCell<Arena>>,
    pub(crate) height: usize,
    /// One list per level below `height`.
    pub(crate) left_fringes: Vec<Vec<NodeId>>,
    /// One list per level below `height`.
    pub(crate) right_fringes: Vec<Vec<NodeId>>,
    pub(crate) top: Vec<NodeId>,
    pub(crate) len: usize,
}

/// Structural snapshot of a forest, for comparing two forests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestShape {
    /// Number of levels below the top.
    pub height: usize,
    /// Left fringe hashes per level.
    pub left_fringes: Vec<Vec<CryptoHash>>,
    /// Top hashes in order.
    pub top: Vec<CryptoHash>,
    /// Right fringe hashes per level.
    pub right_fringes: Vec<Vec<CryptoHash>>,
    /// Every node, pre-order, tree by tree from left to right.
    pub nodes: Vec<NodeShape>,
}

/// One node of a [`ForestShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeShape {
    /// Node hash.
    pub hash: CryptoHash,
    /// Level, 0 for leaves.
    pub level: usize,
    /// Round at which the node merged with its sibling.
    pub bitcount: Option<usize>,
    /// Number of children.
    pub children: u8,
}

/// Copies the live nodes into a fresh arena.
impl Clone for SplitHash {
    fn clone(&self) -> Self {
        let mut arena = Arena::default();
        let ids = arena.copy_trees(&self.arena(), self.spatial_roots());
        self.remapped(Rc::new(RefCell::new(arena)), &ids)
    }
}

impl SplitHash {
    /// Empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forest holding a single block.
    pub fn from_block<B: Block + ?Sized>(block: &B) -> Self {
        Self::from_single_hash(block.hash())
    }

    fn from_single_hash(hash: CryptoHash) -> Self {
        let mut arena = Arena::default();
        let leaf = arena.leaf(hash);
        SplitHash {
            arena: Rc::new(RefCell::new(arena)),
            height: 0,
            left_fringes: Vec::new(),
            right_fringes: Vec::new(),
            top: vec![leaf],
            len: 1,
        }
    }

    /// Build a forest over `blocks`.
    pub fn create<B: Block>(blocks: &[B]) -> Result<Self> {
        let hashes: Vec<CryptoHash> = blocks.iter().map(Block::hash).collect();
        Self::from_leaf_hashes(&hashes)
    }

    /// Build a forest whose leaves carry `hashes`.
    pub fn from_leaf_hashes(hashes: &[CryptoHash]) -> Result<Self> {
        match hashes {
            [] => return Ok(Self::default()),
            [hash] => return Ok(Self::from_single_hash(*hash)),
            _ => {}
        }

        let mut arena = Arena::default();
        let mut center: Vec<NodeId> = hashes.iter().map(|hash| arena.leaf(*hash)).collect();

        let mut left_fringes = Vec::new();
        let mut right_fringes = Vec::new();
        let mut level = 0;
        while !center.is_empty() {
            let round = do_round(&mut arena, &center, true, true, level)?;
            center = round.center;
            left_fringes.push(round.left_fringe);
            right_fringes.push(round.right_fringe);
            level += 1;
        }

        // The last level produced no parents: its fringes are the top.
        let height = level - 1;
        let mut top = left_fringes.pop().unwrap_or_default();
        top.extend(right_fringes.pop().unwrap_or_default());

        Ok(SplitHash {
            arena: Rc::new(RefCell::new(arena)),
            height,
            left_fringes,
            right_fringes,
            top,
            len: hashes.len(),
        })
    }

    /// Concatenate two forests.
    ///
    /// Only the facing fringes are reclassified, level by level; everything
    /// else is carried over. Both operands are consumed and their nodes move
    /// into the result. Operands from different arenas are first brought
    /// into one, by copying the smaller operand.
    pub fn merge(left: Self, right: Self) -> Result<Self> {
        if left.is_empty() {
            return Ok(right);
        }
        if right.is_empty() {
            return Ok(left);
        }

        let (left_len, right_len) = (left.len, right.len);
        let (left, right) = Self::share_arena(left, right);
        let shared = Rc::clone(&left.arena);
        let mut arena = shared.borrow_mut();

        let mut left_fringes = Vec::new();
        let mut right_fringes = Vec::new();
        let mut center = Vec::new();
        let mut h = 0;
        loop {
            let volatile_left = h >= left.height;
            let volatile_right = h >= right.height;

            let mut seam = Vec::new();
            if !volatile_left {
                seam.extend_from_slice(&left.right_fringes[h]);
            } else if h == left.height {
                seam.extend_from_slice(&left.top);
            }
            seam.append(&mut center);
            if !volatile_right {
                seam.extend_from_slice(&right.left_fringes[h]);
            } else if h == right.height {
                seam.extend_from_slice(&right.top);
            }

            if volatile_left && volatile_right && seam.is_empty() {
                break;
            }

            Self::link_seam(&mut arena, &left, &right, h, &seam);
            let round = do_round(&mut arena, &seam, volatile_left, volatile_right, h)?;
            center = round.center;

            left_fringes.push(if volatile_left {
                round.left_fringe
            } else {
                left.left_fringes[h].clone()
            });
            right_fringes.push(if volatile_right {
                round.right_fringe
            } else {
                right.right_fringes[h].clone()
            });
            h += 1;
        }
        drop(arena);

        // The loop runs at least once: both operands have a top.
        let height = h.saturating_sub(1);
        let mut top = left_fringes.pop().unwrap_or_default();
        top.extend(right_fringes.pop().unwrap_or_default());

        let mut merged = SplitHash {
            arena: shared,
            height,
            left_fringes,
            right_fringes,
            top,
            len: left_len + right_len,
        };
        drop((left, right));
        merged.compact_if_sparse();

        debug!(left_len, right_len, height, "merged forests");
        Ok(merged)
    }

    /// Bring both forests onto one arena. Forests already sharing one are
    /// returned as they are; otherwise the smaller one is copied into the
    /// arena of the larger.
    fn share_arena(left: Self, right: Self) -> (Self, Self) {
        if Rc::ptr_eq(&left.arena, &right.arena) {
            (left, right)
        } else if left.len >= right.len {
            let right = right.move_into(&left.arena);
            (left, right)
        } else {
            let left = left.move_into(&right.arena);
            (left, right)
        }
    }

    fn move_into(self, target: &Rc<RefCell<Arena>>) -> Self {
        let ids = target
            .borrow_mut()
            .copy_trees(&self.arena(), self.spatial_roots());
        self.remapped(Rc::clone(target), &ids)
    }

    /// This forest's layout on `arena`, with every node id translated
    /// through `ids`.
    fn remapped(&self, arena: Rc<RefCell<Arena>>, ids: &HashMap<NodeId, NodeId>) -> Self {
        let remap = |list: &Vec<NodeId>| list.iter().map(|id| ids[id]).collect::<Vec<_>>();
        SplitHash {
            arena,
            height: self.height,
            left_fringes: self.left_fringes.iter().map(remap).collect(),
            right_fringes: self.right_fringes.iter().map(remap).collect(),
            top: remap(&self.top),
            len: self.len,
        }
    }

    /// Copy the live nodes into a fresh arena when this forest is the only
    /// user of its arena and most of it is garbage.
    pub(crate) fn compact_if_sparse(&mut self) {
        if Rc::strong_count(&self.arena) > 1 {
            return;
        }
        let live = self.live_nodes();
        let total = self.arena().len();
        if total <= SPARSE_FACTOR * live.max(1) {
            return;
        }
        debug!(total, live, "compacting forest arena");
        *self = self.clone();
    }

    /// Number of nodes reachable from the roots.
    pub(crate) fn live_nodes(&self) -> usize {
        let arena = self.arena();
        self.spatial_roots().map(|root| arena[root].nodes).sum()
    }

    /// Shared view of the node arena.
    pub(crate) fn arena(&self) -> Ref<'_, Arena> {
        self.arena.borrow()
    }

    /// Connect the seam of level `h` to the untouched nodes of both operands
    /// on that level. The seam itself is linked by the round.
    fn link_seam(arena: &mut Arena, left: &Self, right: &Self, h: usize, seam: &[NodeId]) {
        // A non-empty facing fringe is already linked to its own forest.
        let before = (h < left.height && left.right_fringes[h].is_empty())
            .then(|| left.last_at_level(arena, h))
            .flatten();
        let after = (h < right.height && right.left_fringes[h].is_empty())
            .then(|| right.first_at_level(arena, h))
            .flatten();

        match (seam.first(), seam.last()) {
            (Some(&first), Some(&last)) => {
                if let Some(before) = before {
                    arena.link(before, first);
                }
                if let Some(after) = after {
                    arena.link(last, after);
                }
            }
            _ => {
                if let (Some(before), Some(after)) = (before, after) {
                    arena.link(before, after);
                }
            }
        }
    }

    /// Roots from left to right.
    pub(crate) fn spatial_roots(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.left_fringes
            .iter()
            .flatten()
            .chain(self.top.iter())
            .chain(self.right_fringes.iter().rev().flatten())
            .copied()
    }

    /// Roots in authenticator order.
    pub(crate) fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.left_fringes
            .iter()
            .flatten()
            .chain(self.top.iter())
            .chain(self.right_fringes.iter().flatten())
            .copied()
    }

    /// Leftmost node on `level`, looked up in `arena`.
    pub(crate) fn first_at_level(&self, arena: &Arena, level: usize) -> Option<NodeId> {
        self.spatial_roots()
            .find(|&root| arena[root].level >= level)
            .map(|root| arena.leftmost_at(root, level))
    }

    /// Rightmost node on `level`, looked up in `arena`.
    pub(crate) fn last_at_level(&self, arena: &Arena, level: usize) -> Option<NodeId> {
        self.spatial_roots()
            .rev()
            .find(|&root| arena[root].level >= level)
            .map(|root| arena.rightmost_at(root, level))
    }

    /// The root holding leaf `index` and that leaf, found through the leaf
    /// counts of the roots.
    pub(crate) fn locate(&self, arena: &Arena, mut index: usize) -> Option<(NodeId, NodeId)> {
        for root in self.spatial_roots() {
            let leaves = arena[root].leaves;
            if index < leaves {
                return Some((root, arena.leaf_below(root, index)));
            }
            index -= leaves;
        }
        None
    }

    fn locate_checked(&self, arena: &Arena, index: usize) -> Result<(NodeId, NodeId)> {
        let located = self.locate(arena, index).ok_or(InvalidIndex {
            index,
            len: self.len,
        })?;
        Ok(located)
    }

    /// Every node grouped by level, each level from left to right.
    #[cfg(any(test, feature = "test_utils"))]
    pub(crate) fn levels(&self) -> Vec<Vec<NodeId>> {
        let arena = self.arena();
        let mut levels: Vec<Vec<NodeId>> = vec![Vec::new(); self.height + 1];
        for root in self.spatial_roots() {
            for id in arena.preorder(root) {
                let level = arena[id].level;
                if level >= levels.len() {
                    levels.resize_with(level + 1, Vec::new);
                }
                levels[level].push(id);
            }
        }
        levels
    }

    /// Number of levels below the top.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the forest holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn hashes_of(&self, ids: &[NodeId]) -> Vec<CryptoHash> {
        let arena = self.arena();
        ids.iter().map(|&id| arena[id].hash).collect()
    }

    /// Leaf hashes in order.
    pub fn leaf_hashes(&self) -> Vec<CryptoHash> {
        let arena = self.arena();
        self.spatial_roots()
            .flat_map(|root| arena.preorder(root))
            .filter(|&id| arena[id].level == 0)
            .map(|id| arena[id].hash)
            .collect()
    }

    /// Hash of the leaf at `index`.
    pub fn leaf_hash(&self, index: usize) -> Result<CryptoHash> {
        let arena = self.arena();
        let (_, leaf) = self.locate_checked(&arena, index)?;
        Ok(arena[leaf].hash)
    }

    /// Left fringe hashes, one list per level below the top.
    pub fn left_fringes(&self) -> Vec<Vec<CryptoHash>> {
        self.left_fringes.iter().map(|l| self.hashes_of(l)).collect()
    }

    /// Right fringe hashes, one list per level below the top.
    pub fn right_fringes(&self) -> Vec<Vec<CryptoHash>> {
        self.right_fringes.iter().map(|l| self.hashes_of(l)).collect()
    }

    /// Top hashes in order.
    pub fn top(&self) -> Vec<CryptoHash> {
        self.hashes_of(&self.top)
    }

    /// Every root hash: left fringes (low to high), top, right fringes (low
    /// to high).
    pub fn all_roots(&self) -> Vec<CryptoHash> {
        let arena = self.arena();
        self.roots().map(|id| arena[id].hash).collect()
    }

    /// Hash of the root whose tree holds the leaf at `index`.
    pub fn root_of(&self, index: usize) -> Result<CryptoHash> {
        let arena = self.arena();
        let (root, _) = self.locate_checked(&arena, index)?;
        Ok(arena[root].hash)
    }

    /// Fold every root into a single hash tree and return its root, `None`
    /// for the empty forest.
    ///
    /// Fringes are folded in level by level from both edges with rounds
    /// whose ends are not volatile, then the folded edges and the top are
    /// folded until one hash remains. Like the authenticator, the result
    /// depends only on the leaf hashes.
    pub fn finish(&self) -> Result<Option<CryptoHash>> {
        if self.is_empty() {
            return Ok(None);
        }

        let mut left: Vec<CryptoHash> = Vec::new();
        let mut right: Vec<CryptoHash> = Vec::new();
        let right_fringes = self.right_fringes();
        for (level, (left_fringe, right_fringe)) in
            self.left_fringes().into_iter().zip(right_fringes).enumerate()
        {
            left.extend(left_fringe);
            right = right_fringe.into_iter().chain(right).collect();
            left = fold_level(&left, level)?;
            right = fold_level(&right, level)?;
        }

        let mut hashes = left;
        hashes.extend(self.top());
        hashes.extend(right);
        let mut level = self.height;
        while hashes.len() > 1 {
            hashes = fold_level(&hashes, level)?;
            level += 1;
        }
        Ok(hashes.first().copied())
    }

    /// Structural snapshot of the forest.
    pub fn shape(&self) -> ForestShape {
        let arena = self.arena();
        let nodes = self
            .spatial_roots()
            .flat_map(|root| arena.preorder(root))
            .map(|id| {
                let node = &arena[id];
                NodeShape {
                    hash: node.hash,
                    level: node.level,
                    bitcount: node.bitcount,
                    children: u8::from(node.left.is_some()) + u8::from(node.right.is_some()),
                }
            })
            .collect();
        ForestShape {
            height: self.height,
            left_fringes: self.left_fringes(),
            top: self.top(),
            right_fringes: self.right_fringes(),
            nodes,
        }
    }

    /// Membership proof for the block at `index`: the sibling hashes from the
    /// leaf up to its root. Single-child hops add nothing.
    pub fn proof(&self, index: usize) -> Result<Proof> {
        let arena = self.arena();
        let (_, mut id) = self.locate_checked(&arena, index)?;

        let mut siblings = Vec::new();
        while let Some(parent) = arena[id].parent {
            let parent_node = &arena[parent];
            if let (Some(left), Some(right)) = (parent_node.left, parent_node.right) {
                if left == id {
                    siblings.push((arena[right].hash, Side::Right));
                } else {
                    siblings.push((arena[left].hash, Side::Left));
                }
            }
            id = parent;
        }

        Ok(Proof::new(index, siblings))
    }

    /// Current authenticator.
    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.all_roots())
    }
}

impl AuthenticatedDataStructure for SplitHash {
    type Proof = Proof;
    type Authenticator = Authenticator;
    type Error = Error;

    fn create<B: Block>(blocks: &[B]) -> Result<Self> {
        SplitHash::create(blocks)
    }

    fn merge(left: Self, right: Self) -> Result<Self> {
        SplitHash::merge(left, right)
    }

    fn split(self, index: usize) -> Result<(Self, Self)> {
        SplitHash::split(self, index)
    }

    fn len(&self) -> usize {
        SplitHash::len(self)
    }

    fn proof(&self, index: usize) -> Result<Proof> {
        SplitHash::proof(self, index)
    }

    fn authenticator(&self) -> Authenticator {
        SplitHash::authenticator(self)
    }

    fn verify<B: Block + ?Sized>(
        block: &B,
        proof: &Proof,
        authenticator: &Authenticator,
    ) -> bool {
        verify(block, proof, authenticator)
    }
}
