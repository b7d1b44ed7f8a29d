//! Wire framing for the lancaster reliable-multicast protocol.
//!
//! See [`Message`] for the opcode table and [`HashId`] for the tarball content
//! identifier every message is tagged with.

pub mod error;
pub mod hash_id;
pub mod message;

pub use error::ProtoError;
pub use hash_id::{HashId, HashIdParseError};
pub use message::{Message, opcode};

/// Default control-channel port (data channel is this plus one).
pub const DEFAULT_CONTROL_PORT: u16 = 1360;

/// Default payload size for a single [`Message::DataSection`] chunk, chosen so
/// framed datagrams fit within a typical Ethernet MTU.
pub const DEFAULT_CHUNK_SIZE: usize = 1400;

/// Default server announce interval.
pub const DEFAULT_ANNOUNCE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Default client resend timer.
pub const DEFAULT_RESEND_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);
