//! Crate-wide error type.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration error: an unknown algorithm name, zero levels/cycles,
    /// or a grid size that does not divide evenly across multigrid levels.
    #[error("configuration error: {0}")]
    Config(String),
    /// A selected smoother/restrictor/prolongator does not implement the
    /// spatial rank it was asked to run on.
    #[error("dimensional mismatch: {what} does not support {dims}D grids")]
    DimensionMismatch {
        /// Name of the algorithm or operator that was asked to run.
        what: &'static str,
        /// The spatial dimensionality it was asked to support.
        dims: usize,
    },
    /// A migration round produced more outgoing or incoming particles than
    /// the corresponding buffer was sized for.
    #[error("{buffer} overflow: capacity {capacity}, needed {needed}")]
    Overflow {
        /// Which buffer overflowed (`"emigrants"` or `"immigrants"`).
        buffer: &'static str,
        /// The buffer's fixed capacity.
        capacity: usize,
        /// The space that would have been required to hold the message.
        needed: usize,
    },
    /// A transport-level communication failure. Always fatal.
    #[error("communication error: {0}")]
    Comm(String),
    /// An error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
