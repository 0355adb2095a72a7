//! Error types for regxml-mxf.

use thiserror::Error;

/// MXF structure errors.
#[derive(Debug, Error)]
#[must_use]
pub enum Error {
    #[error("illegal partition pack: {0}")]
    IllegalPartitionPack(String),

    #[error("footer partition is open")]
    OpenFooterPartition,

    #[error("group {0} is missing an instance ID item")]
    MissingInstanceUid(String),

    #[error("instance ID item holds {0} bytes, 16 required")]
    TruncatedInstanceUid(usize),

    #[error(transparent)]
    Klv(#[from] regxml_klv::Error),
}

/// Result type alias for MXF operations.
pub type Result<T> = std::result::Result<T, Error>;
