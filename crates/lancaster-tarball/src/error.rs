use thiserror::Error;

/// Errors the tarball reader/writer can report.
///
/// `OutOfRange` offsets are a programmer error (per the protocol's error
/// policy) and are reported as panics from [`crate::ReadAt::read_at`] /
/// [`crate::WriteAt::write_at`] rather than a variant here — nothing a remote
/// peer sends can trigger one, since the caller validates against the tarball
/// size (learned from verified metadata) before ever issuing a read or write.
#[derive(Debug, Error)]
pub enum TarballError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("content hash mismatch for {path}")]
    HashMismatch { path: String },

    #[error("metadata-derived hash_id does not match the announced hash_id")]
    MetadataHashMismatch,

    #[error("no files to serve")]
    Empty,

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("unsafe file path in metadata: {0}")]
    UnsafePath(String),
}
