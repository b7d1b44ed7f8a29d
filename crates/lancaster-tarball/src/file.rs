use std::path::PathBuf;

/// A file as it will appear inside the tarball, before it has been opened.
///
/// `path` is the forward-slash relative path recorded in metadata; `local_path`
/// is where the bytes actually live on the serving side's disk.
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub path: String,
    pub local_path: PathBuf,
}

/// A file's logical record within a [`crate::TarballReader`] or
/// [`crate::TarballWriter`].
///
/// `local_path` is receiver/server-local bookkeeping and is never part of the
/// wire metadata (see [`crate::hash::encode_metadata`]).
#[derive(Debug, Clone)]
pub struct TarballFile {
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub hash: [u8; 32],
    pub local_path: PathBuf,
}
