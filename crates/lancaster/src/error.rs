use thiserror::Error;

use lancaster_tarball::TarballError;
use lancaster_transport::TransportError;

/// Top-level error aggregating the lower crates', the way `smb::Error`
/// aggregates `smb_msg`/`smb_transport`/I/O errors in the teacher crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Tarball(#[from] TarballError),

    #[error(transparent)]
    Proto(#[from] lancaster_proto::ProtoError),

    #[error("no files to serve")]
    PreconditionFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
