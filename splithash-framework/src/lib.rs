//! Shared building blocks for authenticated data structures (ADS) over an
//! ordered sequence of blocks.
//!
//! An ADS commits to a sequence so that a prover holding the structure can
//! convince a verifier holding only a short authenticator that a block sits
//! at a given position.
//!
//! # Core types
//!
//! - [`AuthenticatedDataStructure`]: create / merge / split / proof /
//!   authenticator / verify, with append, insert and delete derived from
//!   merge and split.
//! - [`Block`]: a value with a canonical encoding and a derived hash.
//! - [`IntBlock`]: an integer block encoded as its decimal string.
//! - [`CryptoHash`]: the 32-byte Blake3 digest used everywhere.

#![warn(missing_docs)]

mod ads;
mod block;
mod error;
pub mod hash;

pub use ads::AuthenticatedDataStructure;
pub use block::{Block, IntBlock};
pub use error::InvalidIndex;
pub use hash::{CryptoHash, DIGEST_BITS, HASH_LENGTH, NULL_HASH};
