use std::mem;

use crate::{Block, InvalidIndex};

/// An authenticated data structure over an ordered block sequence.
///
/// `merge` and `split` take their operands by value: the nodes of the inputs
/// are reused by the result, so a consumed structure cannot be observed
/// afterwards. `Default` is the empty structure, the identity of `merge`.
///
/// # Errors in the derived operations
///
/// [`append_blocks`](Self::append_blocks),
/// [`insert_blocks`](Self::insert_blocks) and
/// [`delete_blocks`](Self::delete_blocks) check their indices before taking
/// `self`, so an index error leaves the structure as it was. Once `self` has
/// been handed to `split` or `merge` it is gone: if one of those fails, the
/// blocks it held are lost and `self` is left empty. Callers that must not
/// lose the sequence keep the blocks, or a clone, to rebuild from.
pub trait AuthenticatedDataStructure: Sized + Default {
    /// Membership proof for one block.
    type Proof;
    /// Compact commitment a verifier holds.
    type Authenticator;
    /// Structural error of the implementation.
    type Error: std::error::Error + From<InvalidIndex>;

    /// Build a structure over `blocks`, in order.
    fn create<B: Block>(blocks: &[B]) -> Result<Self, Self::Error>;

    /// Concatenate two structures.
    fn merge(left: Self, right: Self) -> Result<Self, Self::Error>;

    /// Cut a structure into the blocks before `index` and the blocks from
    /// `index` on. Accepts `0..=len`.
    fn split(self, index: usize) -> Result<(Self, Self), Self::Error>;

    /// Number of blocks.
    fn len(&self) -> usize;

    /// Whether the structure holds no blocks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Proof for the block at `index`. Accepts `0..len`.
    fn proof(&self, index: usize) -> Result<Self::Proof, Self::Error>;

    /// Current authenticator.
    fn authenticator(&self) -> Self::Authenticator;

    /// Check that `block` is committed to by `authenticator` through `proof`.
    fn verify<B: Block + ?Sized>(
        block: &B,
        proof: &Self::Proof,
        authenticator: &Self::Authenticator,
    ) -> bool;

    /// Append `blocks` at the end: `merge(self, create(blocks))`.
    ///
    /// A structural error after `self` was taken leaves `self` empty.
    fn append_blocks<B: Block>(&mut self, blocks: &[B]) -> Result<(), Self::Error> {
        let suffix = Self::create(blocks)?;
        let current = mem::take(self);
        *self = Self::merge(current, suffix)?;
        Ok(())
    }

    /// Insert `blocks` so that the first one lands at `index`.
    ///
    /// A structural error after `self` was taken leaves `self` empty.
    fn insert_blocks<B: Block>(&mut self, index: usize, blocks: &[B]) -> Result<(), Self::Error> {
        InvalidIndex::check_cut(index, self.len())?;
        let middle = Self::create(blocks)?;
        let (left, right) = mem::take(self).split(index)?;
        *self = Self::merge(Self::merge(left, middle)?, right)?;
        Ok(())
    }

    /// Remove `length` blocks starting at `index`.
    ///
    /// A structural error after `self` was taken leaves `self` empty.
    fn delete_blocks(&mut self, index: usize, length: usize) -> Result<(), Self::Error> {
        let len = self.len();
        InvalidIndex::check_cut(index, len)?;
        let end = index.saturating_add(length);
        InvalidIndex::check_cut(end, len)?;
        let (left, rest) = mem::take(self).split(index)?;
        let (_, right) = rest.split(length)?;
        *self = Self::merge(left, right)?;
        Ok(())
    }
}
