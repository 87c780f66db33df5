//! Membership proofs.

use splithash_framework::{Block, CryptoHash, hash::hash_pair};

/// Where a sibling sits relative to the path from the leaf to its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The sibling is the left child: `hash(sibling || path)`.
    Left,
    /// The sibling is the right child: `hash(path || sibling)`.
    Right,
}

/// Sibling hashes from a leaf up to the root of its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    index: usize,
    siblings: Vec<(CryptoHash, Side)>,
}

impl Proof {
    /// A proof for the leaf at `index` with `siblings` listed bottom-up.
    pub fn new(index: usize, siblings: Vec<(CryptoHash, Side)>) -> Self {
        Proof { index, siblings }
    }

    /// Index of the leaf the proof was generated for.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Sibling hashes with their side, bottom-up.
    pub fn siblings(&self) -> &[(CryptoHash, Side)] {
        &self.siblings
    }

    /// Number of siblings.
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    /// Whether the leaf is itself a root (or only has single-child
    /// ancestors).
    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }

    /// Root hash implied by `block` and this proof.
    pub fn root_for<B: Block + ?Sized>(&self, block: &B) -> CryptoHash {
        self.root_from_hash(block.hash())
    }

    /// Root hash implied by a leaf hash and this proof.
    pub fn root_from_hash(&self, leaf_hash: CryptoHash) -> CryptoHash {
        self.siblings
            .iter()
            .fold(leaf_hash, |candidate, (sibling, side)| match side {
                Side::Left => hash_pair(sibling, &candidate),
                Side::Right => hash_pair(&candidate, sibling),
            })
    }
}
