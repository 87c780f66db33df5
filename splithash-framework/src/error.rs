use thiserror::Error;

/// A position outside the range a structure accepts.
///
/// Split and insert accept `0..=len`; proofs and leaf access accept
/// `0..len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("index {index} out of range for length {len}")]
pub struct InvalidIndex {
    /// The rejected index.
    pub index: usize,
    /// Length of the structure at the time of the call.
    pub len: usize,
}

impl InvalidIndex {
    /// Accept `index` if it is a cut position, `index <= len`.
    pub fn check_cut(index: usize, len: usize) -> Result<(), Self> {
        if index > len {
            return Err(Self { index, len });
        }
        Ok(())
    }

    /// Accept `index` if it addresses an element, `index < len`.
    pub fn check_element(index: usize, len: usize) -> Result<(), Self> {
        if index >= len {
            return Err(Self { index, len });
        }
        Ok(())
    }
}
