use std::time::Duration;

use lancaster_proto::{DEFAULT_ANNOUNCE_INTERVAL, DEFAULT_CHUNK_SIZE, DEFAULT_RESEND_INTERVAL};

/// Server-side knobs, built by the CLI from parsed flags (mirroring
/// `smb::ClientConfig` being built by `smb-cli`'s `make_smb_client_config`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub announce_interval: Duration,
    pub chunk_size: usize,
    /// Target send rate in bytes/second. `None` sends as fast as the event
    /// loop can cycle (no pacing).
    pub bytes_per_sec: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            announce_interval: DEFAULT_ANNOUNCE_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            bytes_per_sec: None,
        }
    }
}

/// Client-side knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub resend_interval: Duration,
    /// Operator-supplied `hash_id`, filtering announcements (or, if set,
    /// skipping the wait for one entirely — see §9's `NewClient` note).
    pub expected_hash_id: Option<lancaster_proto::HashId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            resend_interval: DEFAULT_RESEND_INTERVAL,
            expected_hash_id: None,
        }
    }
}
