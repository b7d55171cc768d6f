//! Content-addressed cache item engine.
//!
//! Two operations: [`archive::writer::CacheWriter`] serializes a set of
//! anchored paths into a compressed tar archive and exposes a SHA-512
//! digest of the final bytes; [`archive::reader::CacheReader`] restores an
//! archive back onto disk at a chosen anchor, enforcing that no entry ever
//! writes outside it.
//!
//! This crate has no process-wide state: every `CacheWriter`/`CacheReader`
//! owns its own handles, and nothing here installs a logger or a
//! subscriber. Callers wire up `tracing` however they see fit.

pub mod archive;
mod name_validate;

pub use archive::{
    compression::Compression,
    reader::CacheReader,
    writer::{ArchiveDigest, CacheWriter, ClosedArchive},
};
pub use name_validate::{validate, NameValidation};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("path is malformed: {0}")]
    NameMalformed(String),
    #[error("path is not safe on Windows: {0}")]
    NameWindowsUnsafe(String),
    #[error("tar entry type is not supported: {0:?}")]
    UnsupportedFileType(tar::EntryType),
    #[error("tar attempts to write outside of the anchor: {0}")]
    Traversal(String),
    #[error("cycle detected among deferred symlinks")]
    CycleDetected,
    #[error("a directory already exists at {0} where a file was expected")]
    IsADirectory(String),
    #[error(transparent)]
    Path(#[from] cci_paths::PathError),
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Internal sentinel: a symlink's target did not exist at first-pass
    /// time. Caught by the restore loop, which defers the entry; never
    /// returned to a caller.
    #[doc(hidden)]
    #[error("symlink target missing")]
    MissingSymlinkTarget,
}
