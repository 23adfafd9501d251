//! Wire codec errors.

use crate::entity::Block;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Fewer bytes remained than a field needs.
    #[error("truncated input: needed {needed} bytes, {available} left")]
    Truncated { needed: usize, available: usize },

    #[error("json blob of {0} bytes does not fit a 2-byte length")]
    BlobTooLarge(usize),

    #[error("block {0:?} is outside the 16-bit coordinate range")]
    CoordinateOutOfRange(Block),

    #[error("{0} items do not fit a 4-byte count")]
    TooManyItems(usize),

    #[error("fixed-width field: {0}")]
    Field(#[from] bincode::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
