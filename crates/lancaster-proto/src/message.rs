//! Wire message types and their opcodes.
//!
//! Every datagram begins with a 32-byte [`HashId`] followed by a 1-byte opcode.
//! Payload shapes for the opcodes that carry one are encoded with `binrw`;
//! opcode dispatch itself is a plain match, since `receivers must ignore unknown
//! opcodes rather than fail` is more naturally expressed as an `Option` than as
//! a `binrw` enum's all-magics-tried error path.

use std::io::Cursor;

use binrw::prelude::*;
use binrw::helpers::until_eof;

use crate::error::ProtoError;
use crate::hash_id::HashId;

pub mod opcode {
    pub const ANNOUNCE_TARBALL: u8 = 0x01;
    pub const REQUEST_METADATA_HEADER: u8 = 0x10;
    pub const RESPOND_METADATA_HEADER: u8 = 0x11;
    pub const REQUEST_METADATA_SECTION: u8 = 0x12;
    pub const RESPOND_METADATA_SECTION: u8 = 0x13;
    pub const ACK_DATA_SECTION: u8 = 0x20;
    pub const DATA_SECTION: u8 = 0x30;
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
struct RespondMetadataHeaderWire {
    section_count: u16,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
struct RequestMetadataSectionWire {
    index: u16,
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct RespondMetadataSectionWire {
    index: u16,
    #[br(parse_with = until_eof)]
    data: Vec<u8>,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
struct AckDataSectionWire {
    start: i64,
    end_ex: i64,
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
struct DataSectionWire {
    offset: i64,
    #[br(parse_with = until_eof)]
    data: Vec<u8>,
}

/// A fully decoded control or data message, tagged with the tarball it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    AnnounceTarball {
        hash_id: HashId,
    },
    RequestMetadataHeader {
        hash_id: HashId,
    },
    RespondMetadataHeader {
        hash_id: HashId,
        section_count: u16,
    },
    RequestMetadataSection {
        hash_id: HashId,
        index: u16,
    },
    RespondMetadataSection {
        hash_id: HashId,
        index: u16,
        data: Vec<u8>,
    },
    AckDataSection {
        hash_id: HashId,
        start: u64,
        end_ex: u64,
    },
    DataSection {
        hash_id: HashId,
        offset: u64,
        data: Vec<u8>,
    },
}

impl Message {
    /// The tarball id every message carries, regardless of kind.
    pub fn hash_id(&self) -> HashId {
        match self {
            Message::AnnounceTarball { hash_id }
            | Message::RequestMetadataHeader { hash_id }
            | Message::RespondMetadataHeader { hash_id, .. }
            | Message::RequestMetadataSection { hash_id, .. }
            | Message::RespondMetadataSection { hash_id, .. }
            | Message::AckDataSection { hash_id, .. }
            | Message::DataSection { hash_id, .. } => *hash_id,
        }
    }

    fn opcode(&self) -> u8 {
        match self {
            Message::AnnounceTarball { .. } => opcode::ANNOUNCE_TARBALL,
            Message::RequestMetadataHeader { .. } => opcode::REQUEST_METADATA_HEADER,
            Message::RespondMetadataHeader { .. } => opcode::RESPOND_METADATA_HEADER,
            Message::RequestMetadataSection { .. } => opcode::REQUEST_METADATA_SECTION,
            Message::RespondMetadataSection { .. } => opcode::RESPOND_METADATA_SECTION,
            Message::AckDataSection { .. } => opcode::ACK_DATA_SECTION,
            Message::DataSection { .. } => opcode::DATA_SECTION,
        }
    }

    /// Encodes this message as a single datagram payload: `hash_id || opcode || body`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(33);
        buf.extend_from_slice(self.hash_id().as_bytes());
        buf.push(self.opcode());

        let mut cursor = Cursor::new(&mut buf);
        cursor.set_position(33);
        match self {
            Message::AnnounceTarball { .. } | Message::RequestMetadataHeader { .. } => {}
            Message::RespondMetadataHeader { section_count, .. } => {
                RespondMetadataHeaderWire {
                    section_count: *section_count,
                }
                .write_le(&mut cursor)
                .expect("writing to a Vec<u8> cannot fail");
            }
            Message::RequestMetadataSection { index, .. } => {
                RequestMetadataSectionWire { index: *index }
                    .write_le(&mut cursor)
                    .expect("writing to a Vec<u8> cannot fail");
            }
            Message::RespondMetadataSection { index, data, .. } => {
                RespondMetadataSectionWire {
                    index: *index,
                    data: data.clone(),
                }
                .write_le(&mut cursor)
                .expect("writing to a Vec<u8> cannot fail");
            }
            Message::AckDataSection { start, end_ex, .. } => {
                AckDataSectionWire {
                    start: *start as i64,
                    end_ex: *end_ex as i64,
                }
                .write_le(&mut cursor)
                .expect("writing to a Vec<u8> cannot fail");
            }
            Message::DataSection { offset, data, .. } => {
                DataSectionWire {
                    offset: *offset as i64,
                    data: data.clone(),
                }
                .write_le(&mut cursor)
                .expect("writing to a Vec<u8> cannot fail");
            }
        }
        buf
    }

    /// Decodes a single datagram.
    ///
    /// Returns `Ok(None)` for a recognized header with an unknown opcode — the
    /// protocol requires those be ignored, not treated as an error. Returns
    /// `Err` only for a short header or a payload that doesn't fit the shape its
    /// (known) opcode demands.
    pub fn decode(buf: &[u8]) -> Result<Option<Message>, ProtoError> {
        if buf.len() < HashId::LEN + 1 {
            return Err(ProtoError::ShortHeader);
        }

        let mut hash_id_bytes = [0u8; 32];
        hash_id_bytes.copy_from_slice(&buf[..HashId::LEN]);
        let hash_id = HashId::from_bytes(hash_id_bytes);
        let op = buf[HashId::LEN];
        let body = &buf[HashId::LEN + 1..];

        let malformed = |e: binrw::Error| ProtoError::Malformed {
            opcode: op,
            reason: e.to_string(),
        };

        let message = match op {
            opcode::ANNOUNCE_TARBALL => Message::AnnounceTarball { hash_id },
            opcode::REQUEST_METADATA_HEADER => Message::RequestMetadataHeader { hash_id },
            opcode::RESPOND_METADATA_HEADER => {
                let wire = RespondMetadataHeaderWire::read_le(&mut Cursor::new(body))
                    .map_err(malformed)?;
                Message::RespondMetadataHeader {
                    hash_id,
                    section_count: wire.section_count,
                }
            }
            opcode::REQUEST_METADATA_SECTION => {
                let wire = RequestMetadataSectionWire::read_le(&mut Cursor::new(body))
                    .map_err(malformed)?;
                Message::RequestMetadataSection {
                    hash_id,
                    index: wire.index,
                }
            }
            opcode::RESPOND_METADATA_SECTION => {
                let wire = RespondMetadataSectionWire::read_le(&mut Cursor::new(body))
                    .map_err(malformed)?;
                Message::RespondMetadataSection {
                    hash_id,
                    index: wire.index,
                    data: wire.data,
                }
            }
            opcode::ACK_DATA_SECTION => {
                let wire =
                    AckDataSectionWire::read_le(&mut Cursor::new(body)).map_err(malformed)?;
                if wire.start < 0 || wire.end_ex < 0 {
                    return Err(ProtoError::Malformed {
                        opcode: op,
                        reason: "negative region bound".into(),
                    });
                }
                Message::AckDataSection {
                    hash_id,
                    start: wire.start as u64,
                    end_ex: wire.end_ex as u64,
                }
            }
            opcode::DATA_SECTION => {
                let wire = DataSectionWire::read_le(&mut Cursor::new(body)).map_err(malformed)?;
                if wire.offset < 0 {
                    return Err(ProtoError::Malformed {
                        opcode: op,
                        reason: "negative offset".into(),
                    });
                }
                Message::DataSection {
                    hash_id,
                    offset: wire.offset as u64,
                    data: wire.data,
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(message))
    }
}
