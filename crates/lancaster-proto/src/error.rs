use thiserror::Error;

/// Errors recognized while decoding a datagram.
///
/// Per the protocol's error policy, none of these are fatal to a session: a
/// caller that gets one should log it and drop the datagram. Unknown opcodes
/// are not an error at all — [`crate::Message::decode`] returns `Ok(None)` for
/// those, since receivers must ignore them rather than treat them as malformed.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("datagram too short to contain a hash_id + opcode header")]
    ShortHeader,
    #[error("malformed payload for opcode {opcode:#04x}: {reason}")]
    Malformed { opcode: u8, reason: String },
}
