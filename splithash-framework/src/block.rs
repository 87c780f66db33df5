use std::{borrow::Cow, fmt};

use crate::hash::{CryptoHash, hash_bytes};

/// A data block stored in an authenticated sequence.
///
/// The hash depends only on the canonical encoding.
pub trait Block {
    /// Canonical byte encoding of the block.
    fn encode(&self) -> Cow<'_, [u8]>;

    /// Digest of the canonical encoding.
    fn hash(&self) -> CryptoHash {
        hash_bytes(&self.encode())
    }
}

impl<T: Block + ?Sized> Block for &T {
    fn encode(&self) -> Cow<'_, [u8]> {
        (**self).encode()
    }

    fn hash(&self) -> CryptoHash {
        (**self).hash()
    }
}

impl Block for [u8] {
    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl Block for Vec<u8> {
    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_slice())
    }
}

impl Block for str {
    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl Block for String {
    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

/// An integer block, encoded as its decimal representation (`42` → `"42"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IntBlock(i32);

impl IntBlock {
    /// Wrap an integer.
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// The wrapped integer.
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl From<i32> for IntBlock {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for IntBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Block for IntBlock {
    fn encode(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.0.to_string().into_bytes())
    }
}
