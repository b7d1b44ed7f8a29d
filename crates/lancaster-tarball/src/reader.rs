//! Server-side random-access reader over an ordered list of files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use lancaster_proto::HashId;

use crate::error::TarballError;
use crate::file::{FileSpec, TarballFile};
use crate::hash::{derive_hash_id, encode_metadata};
use crate::traits::ReadAt;

/// Opens a fixed list of files for read and presents them as one contiguous,
/// content-addressed byte stream.
///
/// Per-file SHA-256 is computed eagerly on open (paid once, not per read), and
/// `hash_id` is derived from the ordered `(path, size, mode, hash)` tuples at
/// the same time.
pub struct TarballReader {
    hash_id: HashId,
    size: u64,
    files: Vec<TarballFile>,
    offsets: Vec<u64>,
    handles: Vec<Mutex<File>>,
}

impl TarballReader {
    /// Opens every file named by `specs`, in order.
    ///
    /// Fails with [`TarballError::Empty`] if `specs` is empty — per the
    /// protocol's error policy, an empty serve list is fatal at startup.
    pub fn open(specs: Vec<FileSpec>) -> Result<Self, TarballError> {
        if specs.is_empty() {
            return Err(TarballError::Empty);
        }

        let mut files = Vec::with_capacity(specs.len());
        let mut handles = Vec::with_capacity(specs.len());
        let mut offsets = Vec::with_capacity(specs.len());
        let mut size = 0u64;

        for spec in specs {
            log::debug!("opening {} as {}", spec.local_path.display(), spec.path);
            let mut handle = File::open(&spec.local_path)?;
            let metadata = handle.metadata()?;
            let file_size = metadata.len();
            let mode = file_mode(&metadata);
            let hash = hash_stream(&mut handle)?;
            handle.seek(SeekFrom::Start(0))?;

            offsets.push(size);
            size += file_size;
            files.push(TarballFile {
                path: spec.path,
                size: file_size,
                mode,
                hash,
                local_path: spec.local_path,
            });
            handles.push(Mutex::new(handle));
        }

        let hash_id = derive_hash_id(size, &files)?;
        log::info!(
            "tarball ready: {} files, {size} bytes, hash_id {hash_id}",
            files.len()
        );

        Ok(Self {
            hash_id,
            size,
            files,
            offsets,
            handles,
        })
    }

    pub fn hash_id(&self) -> HashId {
        self.hash_id
    }

    pub fn files(&self) -> &[TarballFile] {
        &self.files
    }

    /// The canonical metadata byte stream, chunked by the caller into
    /// MTU-sized sections for `RespondMetadataSection`.
    pub fn metadata_bytes(&self) -> Result<Vec<u8>, TarballError> {
        encode_metadata(self.size, &self.files)
    }

    /// Index of the file containing global byte `offset`.
    fn locate(&self, offset: u64) -> usize {
        self.offsets.partition_point(|&start| start <= offset) - 1
    }
}

impl ReadAt for TarballReader {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, TarballError> {
        assert!(
            offset < self.size,
            "TarballReader::read_at: offset {offset} out of range (size {})",
            self.size
        );

        let mut filled = 0usize;
        let mut cursor = offset;

        while filled < buf.len() && cursor < self.size {
            let idx = self.locate(cursor);
            let local_offset = cursor - self.offsets[idx];
            let file_remaining = self.files[idx].size - local_offset;
            let want = ((buf.len() - filled) as u64).min(file_remaining) as usize;

            let mut handle = self.handles[idx].lock().expect("reader mutex poisoned");
            handle.seek(SeekFrom::Start(local_offset))?;
            handle.read_exact(&mut buf[filled..filled + want])?;

            filled += want;
            cursor += want as u64;
        }

        Ok(filled)
    }

    fn len(&self) -> u64 {
        self.size
    }
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

fn hash_stream(handle: &mut File) -> Result<[u8; 32], TarballError> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = handle.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}
