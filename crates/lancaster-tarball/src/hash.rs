//! Canonical metadata encoding and the [`HashId`] it hashes to.
//!
//! This is the same byte layout the wire metadata payload uses (§4.B), minus
//! the section framing: `i64 tarball_size`, `u32 file_count`, then per file
//! `u16 path_len`, `path_len` bytes, `i64 size`, `u32 mode`, 32 bytes `hash`.
//! Both the reader (deriving its own `hash_id` from files it opened) and the
//! writer (verifying a received `hash_id` against decoded metadata) go through
//! [`encode_metadata`] so the two can never disagree on layout.

use sha2::{Digest, Sha256};

use lancaster_proto::HashId;

use crate::error::TarballError;
use crate::file::TarballFile;

/// Encodes the canonical metadata stream for `files`.
///
/// `size` is the tarball's total byte length (the caller's prefix-summed
/// total, passed in rather than recomputed so callers that already track it
/// don't pay for a second pass).
pub fn encode_metadata(size: u64, files: &[TarballFile]) -> Result<Vec<u8>, TarballError> {
    let file_count: u32 = files
        .len()
        .try_into()
        .map_err(|_| TarballError::MalformedMetadata("too many files".into()))?;

    let mut buf = Vec::with_capacity(12 + files.len() * 48);
    buf.extend_from_slice(&(size as i64).to_le_bytes());
    buf.extend_from_slice(&file_count.to_le_bytes());

    for file in files {
        let path_len: u16 = file.path.len().try_into().map_err(|_| {
            TarballError::MalformedMetadata(format!("path too long: {}", file.path))
        })?;
        buf.extend_from_slice(&path_len.to_le_bytes());
        buf.extend_from_slice(file.path.as_bytes());
        buf.extend_from_slice(&(file.size as i64).to_le_bytes());
        buf.extend_from_slice(&file.mode.to_le_bytes());
        buf.extend_from_slice(&file.hash);
    }

    Ok(buf)
}

/// Decodes a canonical metadata stream back into `(size, files)`.
///
/// The decoded files carry an empty `local_path` — callers that need one
/// (the writer, matching a metadata entry against a supplied file spec) fill
/// it in separately.
pub fn decode_metadata(buf: &[u8]) -> Result<(u64, Vec<TarballFile>), TarballError> {
    let mut cursor = buf;
    let size = read_i64(&mut cursor)? as u64;
    let file_count = read_u32(&mut cursor)?;

    let mut files = Vec::with_capacity(file_count as usize);
    for _ in 0..file_count {
        let path_len = read_u16(&mut cursor)? as usize;
        if cursor.len() < path_len {
            return Err(TarballError::MalformedMetadata("truncated path".into()));
        }
        let (path_bytes, rest) = cursor.split_at(path_len);
        let path = std::str::from_utf8(path_bytes)
            .map_err(|_| TarballError::MalformedMetadata("path is not valid UTF-8".into()))?
            .to_owned();
        cursor = rest;

        let file_size = read_i64(&mut cursor)? as u64;
        let mode = read_u32(&mut cursor)?;
        if cursor.len() < 32 {
            return Err(TarballError::MalformedMetadata("truncated hash".into()));
        }
        let (hash_bytes, rest) = cursor.split_at(32);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(hash_bytes);
        cursor = rest;

        files.push(TarballFile {
            path,
            size: file_size,
            mode,
            hash,
            local_path: Default::default(),
        });
    }

    Ok((size, files))
}

/// The deterministic content identifier for `files`: a SHA-256 digest of
/// [`encode_metadata`]'s output.
pub fn derive_hash_id(size: u64, files: &[TarballFile]) -> Result<HashId, TarballError> {
    let metadata = encode_metadata(size, files)?;
    let mut hasher = Sha256::new();
    hasher.update(&metadata);
    let digest: [u8; 32] = hasher.finalize().into();
    Ok(HashId::from_bytes(digest))
}

fn read_i64(cursor: &mut &[u8]) -> Result<i64, TarballError> {
    if cursor.len() < 8 {
        return Err(TarballError::MalformedMetadata("truncated i64".into()));
    }
    let (bytes, rest) = cursor.split_at(8);
    let value = i64::from_le_bytes(bytes.try_into().unwrap());
    *cursor = rest;
    Ok(value)
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32, TarballError> {
    if cursor.len() < 4 {
        return Err(TarballError::MalformedMetadata("truncated u32".into()));
    }
    let (bytes, rest) = cursor.split_at(4);
    let value = u32::from_le_bytes(bytes.try_into().unwrap());
    *cursor = rest;
    Ok(value)
}

fn read_u16(cursor: &mut &[u8]) -> Result<u16, TarballError> {
    if cursor.len() < 2 {
        return Err(TarballError::MalformedMetadata("truncated u16".into()));
    }
    let (bytes, rest) = cursor.split_at(2);
    let value = u16::from_le_bytes(bytes.try_into().unwrap());
    *cursor = rest;
    Ok(value)
}

/// Computes the SHA-256 content digest of a single file's bytes.
pub fn hash_file_contents(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> Vec<TarballFile> {
        vec![
            TarballFile {
                path: "a.txt".into(),
                size: 3,
                mode: 0o644,
                hash: hash_file_contents(b"abc"),
                local_path: Default::default(),
            },
            TarballFile {
                path: "dir/b.txt".into(),
                size: 5,
                mode: 0o600,
                hash: hash_file_contents(b"hello"),
                local_path: Default::default(),
            },
        ]
    }

    #[test]
    fn metadata_round_trips() {
        let files = sample_files();
        let encoded = encode_metadata(8, &files).unwrap();
        let (size, decoded) = decode_metadata(&encoded).unwrap();
        assert_eq!(size, 8);
        assert_eq!(decoded.len(), files.len());
        for (a, b) in files.iter().zip(decoded.iter()) {
            assert_eq!(a.path, b.path);
            assert_eq!(a.size, b.size);
            assert_eq!(a.mode, b.mode);
            assert_eq!(a.hash, b.hash);
        }
    }

    #[test]
    fn hash_id_is_deterministic_and_order_sensitive() {
        let files = sample_files();
        let id_a = derive_hash_id(8, &files).unwrap();
        let id_b = derive_hash_id(8, &files).unwrap();
        assert_eq!(id_a, id_b);

        let mut reordered = files.clone();
        reordered.reverse();
        let id_c = derive_hash_id(8, &reordered).unwrap();
        assert_ne!(id_a, id_c);
    }

    #[test]
    fn hash_id_changes_with_content() {
        let mut files = sample_files();
        let id_a = derive_hash_id(8, &files).unwrap();
        files[0].hash = hash_file_contents(b"xyz");
        let id_b = derive_hash_id(8, &files).unwrap();
        assert_ne!(id_a, id_b);
    }
}
