//! Receiver-side random-access writer over an ordered list of files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use lancaster_proto::HashId;

use crate::error::TarballError;
use crate::file::TarballFile;
use crate::hash::{decode_metadata, derive_hash_id};
use crate::traits::WriteAt;

const PART_SUFFIX: &str = ".part";

/// Creates (pre-sized, sparse where supported) `<path>.part` files under a
/// destination directory and accepts random-access writes into them, per the
/// metadata decoded from the wire.
///
/// On [`TarballWriter::close`] each file's content hash is checked against
/// the metadata; files that pass are renamed to their final name and have
/// their `mode` applied, files that fail are deleted and the writer reports
/// [`TarballError::HashMismatch`].
pub struct TarballWriter {
    hash_id: HashId,
    size: u64,
    files: Vec<TarballFile>,
    offsets: Vec<u64>,
    handles: Vec<Mutex<File>>,
    part_paths: Vec<PathBuf>,
    final_paths: Vec<PathBuf>,
}

impl TarballWriter {
    /// Decodes `metadata` (the concatenation of all received metadata
    /// sections), verifies it hashes to `expected_hash_id`, and creates the
    /// on-disk `.part` files under `dest_dir`.
    pub fn create(
        dest_dir: &Path,
        expected_hash_id: HashId,
        metadata: &[u8],
    ) -> Result<Self, TarballError> {
        let (size, files) = decode_metadata(metadata)?;
        if derive_hash_id(size, &files)? != expected_hash_id {
            return Err(TarballError::MetadataHashMismatch);
        }
        if files.is_empty() {
            return Err(TarballError::Empty);
        }

        let mut offsets = Vec::with_capacity(files.len());
        let mut handles = Vec::with_capacity(files.len());
        let mut part_paths = Vec::with_capacity(files.len());
        let mut final_paths = Vec::with_capacity(files.len());
        let mut cursor = 0u64;

        for file in &files {
            let final_path = sanitized_join(dest_dir, &file.path)?;
            let part_path = {
                let mut s = final_path.as_os_str().to_os_string();
                s.push(PART_SUFFIX);
                PathBuf::from(s)
            };

            if let Some(parent) = final_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let handle = File::create(&part_path)?;
            handle.set_len(file.size)?;
            log::debug!("staging {} ({} bytes)", part_path.display(), file.size);

            offsets.push(cursor);
            cursor += file.size;
            handles.push(Mutex::new(handle));
            part_paths.push(part_path);
            final_paths.push(final_path);
        }

        Ok(Self {
            hash_id: expected_hash_id,
            size,
            files,
            offsets,
            handles,
            part_paths,
            final_paths,
        })
    }

    pub fn hash_id(&self) -> HashId {
        self.hash_id
    }

    pub fn files(&self) -> &[TarballFile] {
        &self.files
    }

    fn locate(&self, offset: u64) -> usize {
        self.offsets.partition_point(|&start| start <= offset) - 1
    }

    /// Verifies every file's content hash, renames verified `.part` files to
    /// their final names and applies `mode`, and deletes any file that fails
    /// verification.
    ///
    /// Stops at the first mismatch: the remaining `.part` files are left in
    /// place (the session is fatal at this point per §7, so there is no
    /// further writer activity to race with a half-renamed file list).
    pub fn close(self) -> Result<(), TarballError> {
        for (i, file) in self.files.iter().enumerate() {
            let actual = hash_part_file(&self.part_paths[i])?;
            if actual != file.hash {
                log::error!("hash mismatch for {}, deleting", file.path);
                let _ = std::fs::remove_file(&self.part_paths[i]);
                return Err(TarballError::HashMismatch {
                    path: file.path.clone(),
                });
            }

            std::fs::rename(&self.part_paths[i], &self.final_paths[i])?;
            apply_mode(&self.final_paths[i], file.mode)?;
            log::info!("verified and finalized {}", file.path);
        }
        Ok(())
    }
}

impl WriteAt for TarballWriter {
    fn write_at(&self, data: &[u8], offset: u64) -> Result<(), TarballError> {
        assert!(
            offset + data.len() as u64 <= self.size,
            "TarballWriter::write_at: [{offset}, {}) out of range (size {})",
            offset + data.len() as u64,
            self.size
        );

        let mut filled = 0usize;
        let mut cursor = offset;

        while filled < data.len() {
            let idx = self.locate(cursor);
            let local_offset = cursor - self.offsets[idx];
            let file_remaining = self.files[idx].size - local_offset;
            let want = ((data.len() - filled) as u64).min(file_remaining) as usize;

            let mut handle = self.handles[idx].lock().expect("writer mutex poisoned");
            handle.seek(SeekFrom::Start(local_offset))?;
            handle.write_all(&data[filled..filled + want])?;

            filled += want;
            cursor += want as u64;
        }

        Ok(())
    }

    fn len(&self) -> u64 {
        self.size
    }
}

/// Joins `rel` onto `dest_dir`, rejecting anything that could escape it.
fn sanitized_join(dest_dir: &Path, rel: &str) -> Result<PathBuf, TarballError> {
    let rel_path = Path::new(rel);
    if rel_path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        || rel_path.is_absolute()
    {
        return Err(TarballError::UnsafePath(rel.to_owned()));
    }
    Ok(dest_dir.join(rel_path))
}

fn hash_part_file(path: &Path) -> Result<[u8; 32], TarballError> {
    use sha2::{Digest, Sha256};

    let mut handle = File::open(path)?;
    handle.seek(SeekFrom::Start(0))?;
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

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<(), TarballError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> Result<(), TarballError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileSpec;
    use crate::hash::{encode_metadata, hash_file_contents};
    use crate::reader::TarballReader;

    fn build_metadata(files: &[TarballFile], size: u64) -> (HashId, Vec<u8>) {
        let hash_id = derive_hash_id(size, files).unwrap();
        (hash_id, encode_metadata(size, files).unwrap())
    }

    #[test]
    fn writes_verify_and_rename_on_close() {
        let files = vec![
            TarballFile {
                path: "a.txt".into(),
                size: 3,
                mode: 0o644,
                hash: hash_file_contents(b"abc"),
                local_path: Default::default(),
            },
            TarballFile {
                path: "sub/b.txt".into(),
                size: 5,
                mode: 0o644,
                hash: hash_file_contents(b"hello"),
                local_path: Default::default(),
            },
        ];
        let (hash_id, metadata) = build_metadata(&files, 8);

        let dest = tempfile::tempdir().unwrap();
        let writer = TarballWriter::create(dest.path(), hash_id, &metadata).unwrap();

        writer.write_at(b"abc", 0).unwrap();
        writer.write_at(b"hello", 3).unwrap();

        writer.close().unwrap();

        assert_eq!(std::fs::read(dest.path().join("a.txt")).unwrap(), b"abc");
        assert_eq!(
            std::fs::read(dest.path().join("sub/b.txt")).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn mismatched_hash_id_is_rejected_before_any_file_is_created() {
        let files = vec![TarballFile {
            path: "a.txt".into(),
            size: 3,
            mode: 0o644,
            hash: hash_file_contents(b"abc"),
            local_path: Default::default(),
        }];
        let (_, metadata) = build_metadata(&files, 3);
        let wrong_id = HashId::from_bytes([0xee; 32]);

        let dest = tempfile::tempdir().unwrap();
        let result = TarballWriter::create(dest.path(), wrong_id, &metadata);
        assert!(matches!(result, Err(TarballError::MetadataHashMismatch)));
    }

    #[test]
    fn content_mismatch_deletes_part_file_on_close() {
        let files = vec![TarballFile {
            path: "a.txt".into(),
            size: 3,
            mode: 0o644,
            hash: hash_file_contents(b"abc"),
            local_path: Default::default(),
        }];
        let (hash_id, metadata) = build_metadata(&files, 3);

        let dest = tempfile::tempdir().unwrap();
        let writer = TarballWriter::create(dest.path(), hash_id, &metadata).unwrap();
        writer.write_at(b"xyz", 0).unwrap(); // wrong content

        let part_path = dest.path().join("a.txt.part");
        assert!(part_path.exists());

        let result = writer.close();
        assert!(matches!(result, Err(TarballError::HashMismatch { .. })));
        assert!(!part_path.exists());
        assert!(!dest.path().join("a.txt").exists());
    }

    #[test]
    fn rejects_path_escaping_dest_dir() {
        let files = vec![TarballFile {
            path: "../escape.txt".into(),
            size: 1,
            mode: 0o644,
            hash: hash_file_contents(b"x"),
            local_path: Default::default(),
        }];
        let (hash_id, metadata) = build_metadata(&files, 1);
        let dest = tempfile::tempdir().unwrap();
        let result = TarballWriter::create(dest.path(), hash_id, &metadata);
        assert!(matches!(result, Err(TarballError::UnsafePath(_))));
    }

    #[test]
    fn reader_and_writer_round_trip_a_multi_file_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.bin");
        let b_path = dir.path().join("b.bin");
        std::fs::write(&a_path, b"hello world").unwrap();
        std::fs::write(&b_path, vec![0x42u8; 4096]).unwrap();

        let reader = TarballReader::open(vec![
            FileSpec {
                path: "a.bin".into(),
                local_path: a_path,
            },
            FileSpec {
                path: "b.bin".into(),
                local_path: b_path,
            },
        ])
        .unwrap();

        let metadata = reader.metadata_bytes().unwrap();
        let hash_id = reader.hash_id();

        let dest = tempfile::tempdir().unwrap();
        let writer = TarballWriter::create(dest.path(), hash_id, &metadata).unwrap();

        let total = reader.len();
        let mut buf = vec![0u8; 777];
        let mut offset = 0u64;
        while offset < total {
            let want = (buf.len() as u64).min(total - offset) as usize;
            let n = crate::traits::ReadAt::read_at(&reader, &mut buf[..want], offset).unwrap();
            writer.write_at(&buf[..n], offset).unwrap();
            offset += n as u64;
        }

        writer.close().unwrap();

        assert_eq!(
            std::fs::read(dest.path().join("a.bin")).unwrap(),
            b"hello world"
        );
        assert_eq!(
            std::fs::read(dest.path().join("b.bin")).unwrap(),
            vec![0x42u8; 4096]
        );
    }
}
