use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 32-byte SHA-256 digest identifying a tarball.
///
/// Two tarballs with identical files (paths, sizes, modes, contents, order)
/// produce identical [`HashId`]s; any difference yields a new one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashId([u8; 32]);

impl HashId {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for HashId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashId({self})")
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashIdParseError {
    #[error("hash id must be exactly 64 hex characters, got {0}")]
    WrongLength(usize),
    #[error("invalid hex digit in hash id")]
    InvalidHex,
}

impl FromStr for HashId {
    type Err = HashIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != Self::LEN * 2 {
            return Err(HashIdParseError::WrongLength(s.len()));
        }

        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or(HashIdParseError::InvalidHex)?;
            let lo = hex_digit(chunk[1]).ok_or(HashIdParseError::InvalidHex)?;
            bytes[i] = (hi << 4) | lo;
        }

        Ok(Self(bytes))
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
