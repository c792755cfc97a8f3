//! Error types for the scheduling core.
//!
//! Every error here is a programmer-contract violation or a malformed
//! polyhedral input. The core is a batch compile-time pass: there is no
//! recovery policy, callers fix the schedule and re-run. Library entry
//! points return [`Result`]; internal helpers panic only on conditions
//! that indicate a bug in the library itself.

use thiserror::Error;

/// Top-level error type for the scheduling core.
#[derive(Error, Debug)]
pub enum Error {
    /// A computation with the same name already exists in the function.
    #[error("duplicate computation name `{0}`")]
    DuplicateName(String),

    /// A schedule references a computation that is not declared in the
    /// function, even after let-statement prefix repair.
    #[error("scheduling an undeclared computation `{0}`")]
    UnknownComputation(String),

    /// A dimension index is out of range or violates an adjacency
    /// requirement (tiling, GPU tagging).
    #[error("invalid dimension {dim} for a schedule of rank {rank}")]
    InvalidDimension {
        /// The offending dimension index.
        dim: i64,
        /// The output rank of the schedule it was checked against.
        rank: usize,
    },

    /// A split or tile size below 1.
    #[error("invalid split/tile size {0}")]
    InvalidTileSize(i64),

    /// `get_gpu_iterator` was called with a level that is not among the
    /// pair of dimensions tagged for GPU mapping.
    #[error("level {level} of `{name}` is not mapped to a GPU dimension")]
    GpuLevelMismatch {
        /// The computation name.
        name: String,
        /// The level that was queried.
        level: usize,
    },

    /// A type, operator or argument role that the downstream lowering
    /// cannot represent.
    #[error("`{0}` cannot be mapped to the target representation")]
    UnsupportedTypeMapping(String),

    /// Malformed textual presentation or an inconsistent polyhedral
    /// operation (mismatched spaces, unbounded loop dimension, ...).
    #[error("invalid polyhedral input: {0}")]
    InvalidPolyhedral(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidPolyhedral`] with a formatted message.
    pub(crate) fn poly(msg: impl Into<String>) -> Self {
        Error::InvalidPolyhedral(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DuplicateName("S0".to_string());
        assert!(format!("{}", err).contains("S0"));

        let err = Error::InvalidDimension { dim: 7, rank: 5 };
        let s = format!("{}", err);
        assert!(s.contains('7'));
        assert!(s.contains('5'));
    }
}
