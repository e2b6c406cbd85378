//! Error taxonomy for the embedded-archive virtual filesystem.
//!
//! `ResolverMiss` is deliberately not a variant here: the module resolver
//! never throws, it only ever returns `None` (see `crate::runtime::resolver`).

use thiserror::Error;

/// All errors that can surface from installing, reading through, or tearing
/// down the snapshot filesystem.
#[derive(Debug, Error)]
pub enum Error {
    /// The layout header was out of range, or a short read occurred while
    /// materializing the archive blob. The only error kind that is fatal to
    /// `install`.
    #[error("invalid snapshot header: {0}")]
    HeaderInvalid(String),

    /// Path absent in the selected backing filesystem.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory was used where a file was expected.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was used where a directory was expected.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A write-shaped operation was attempted under the virtual root.
    #[error("read-only filesystem: {0}")]
    ReadOnly(String),

    /// The archive bytes could not be parsed by the archive library.
    #[error("malformed archive: {0}")]
    Archive(String),

    /// An underlying I/O error from the real filesystem.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `true` for kinds that a stat-shaped hook translates to a negated
    /// ENOENT rather than propagating.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
