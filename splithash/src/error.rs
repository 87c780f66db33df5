use splithash_framework::InvalidIndex;
use thiserror::Error;

/// Errors from SplitHash operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An index outside the range the operation accepts.
    #[error(transparent)]
    InvalidIndex(#[from] InvalidIndex),
    /// Classifying a level needed more output bits than a digest carries.
    ///
    /// Operations that consume their operands (`merge`, `split` and the
    /// derived edits) do not give them back when this is returned: the
    /// blocks they held are lost.
    #[error("digest exhausted while classifying level {level}: bit {bit_index} is past the end")]
    DigestExhausted {
        /// Level of the nodes being classified.
        level: usize,
        /// First bit index that could not be extracted.
        bit_index: usize,
    },
}

/// Alias for `core::result::Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;
