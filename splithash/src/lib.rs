//! SplitHash: a mergeable, splittable authenticated sequence.
//!
//! Blocks are hashed into leaves and combined bottom-up into a forest whose
//! shape is decided by output bits of the node hashes, not by insertion
//! order. Because the shape depends only on the content, two forests can be
//! merged by reclassifying just the nodes facing each other, and a forest
//! can be split by replaying the classification along the cut.
//!
//! # Core types
//!
//! - [`SplitHash`]: the forest (create, merge, split, proof,
//!   authenticator).
//! - [`Proof`]: sibling hashes from a leaf to its root.
//! - [`Authenticator`]: the set of root hashes a verifier holds.
//! - [`verify`]: recompute a root from a block and a proof and check it.
//!
//! [`SplitHash`] implements
//! [`AuthenticatedDataStructure`](splithash_framework::AuthenticatedDataStructure),
//! which also provides `append_blocks`, `insert_blocks` and `delete_blocks`.

#![warn(missing_docs)]

mod authenticator;
mod error;
mod forest;
mod node;
mod proof;
pub(crate) mod round;
mod split;
/// Helpers for building and checking forests in tests (requires
/// `test_utils` feature).
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod verify;

#[cfg(test)]
mod tests;

pub use authenticator::Authenticator;
pub use error::{Error, Result};
pub use forest::{ForestShape, NodeShape, SplitHash};
pub use proof::{Proof, Side};
pub use splithash_framework::{AuthenticatedDataStructure, Block, CryptoHash, IntBlock};
pub use verify::verify;
