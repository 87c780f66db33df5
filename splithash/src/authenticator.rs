use std::fmt;

use splithash_framework::CryptoHash;

/// The root hashes of a forest.
///
/// Kept in a fixed order (left fringes low to high, top, right fringes low
/// to high) for display, but compared as a multiset: two authenticators are
/// equal when they hold the same roots, whatever the order.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    roots: Vec<CryptoHash>,
}

impl Authenticator {
    /// Wrap a list of root hashes.
    pub fn new(roots: Vec<CryptoHash>) -> Self {
        Authenticator { roots }
    }

    /// Root hashes in the order they were given.
    pub fn roots(&self) -> &[CryptoHash] {
        &self.roots
    }

    /// Number of roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether there are no roots (the empty sequence).
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Whether `hash` is one of the roots.
    pub fn contains(&self, hash: &CryptoHash) -> bool {
        self.roots.contains(hash)
    }

    fn sorted(&self) -> Vec<CryptoHash> {
        let mut roots = self.roots.clone();
        roots.sort_unstable();
        roots
    }
}

impl PartialEq for Authenticator {
    fn eq(&self, other: &Self) -> bool {
        self.roots.len() == other.roots.len() && self.sorted() == other.sorted()
    }
}

impl Eq for Authenticator {}

impl fmt::Display for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, root) in self.roots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", hex::encode(root))?;
        }
        write!(f, "]")
    }
}
