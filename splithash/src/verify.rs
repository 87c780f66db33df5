//! Proof verification.
//!
//! Pure function: recomputes the candidate root from the block and the
//! proof, then checks that it is one of the authenticator's roots.

use splithash_framework::Block;

use crate::{authenticator::Authenticator, proof::Proof};

/// Whether `block` is committed to by `authenticator` through `proof`.
///
/// `false` is an ordinary outcome: the block, the proof or the
/// authenticator does not match.
pub fn verify<B: Block + ?Sized>(block: &B, proof: &Proof, authenticator: &Authenticator) -> bool {
    authenticator.contains(&proof.root_for(block))
}
