//! Server state machine: announcer, responder, data pump (§4.E).
//!
//! The server has no per-client state; it responds uniformly to whatever it
//! hears, the same single-task `tokio::select!` style the client loop uses
//! (§5) — one task, cooperative yielding at each `.await`.

use std::time::Duration;

use lancaster_nak::Region;
use lancaster_proto::{HashId, Message};
use lancaster_tarball::{ReadAt, TarballReader};
use lancaster_transport::ServerTransport;

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Bandwidth and NAK-hint bookkeeping (§3.1). The server is client-agnostic
/// per §5, so this tracks one running rate sample and the single most
/// recent hint seen across every receiver, not per-client state.
#[derive(Debug, Default)]
struct ServerStats {
    bytes_sent: u64,
    bytes_sent_this_second: u64,
    last_rate_bps: u64,
    last_nak_hint: Option<Region>,
}

impl ServerStats {
    fn record_sent(&mut self, n: usize) {
        self.bytes_sent += n as u64;
        self.bytes_sent_this_second += n as u64;
    }

    fn tick_rate(&mut self) {
        self.last_rate_bps = self.bytes_sent_this_second;
        self.bytes_sent_this_second = 0;
        log::info!(
            "server stats: {} bytes sent total, {} B/s",
            self.bytes_sent,
            self.last_rate_bps
        );
    }

    fn observe_hint(&mut self, region: Region) {
        if !region.is_empty() {
            self.last_nak_hint = Some(region);
        }
    }

    /// Consumes the hint if it names a region strictly behind `cursor`,
    /// biasing the data pump toward retransmission without endlessly
    /// rewinding to the same hint from one slow receiver while others are
    /// caught up (§3.1).
    fn take_rewind(&mut self, cursor: u64) -> Option<u64> {
        match self.last_nak_hint {
            Some(hint) if hint.start < cursor => {
                self.last_nak_hint = None;
                Some(hint.start)
            }
            _ => None,
        }
    }
}

/// Announces a tarball and serves it to any number of simultaneous
/// receivers over a [`ServerTransport`].
pub struct Server<T: ServerTransport> {
    config: ServerConfig,
    transport: T,
    reader: TarballReader,
    hash_id: HashId,
    metadata_sections: Vec<Vec<u8>>,
    stats: ServerStats,
}

impl<T: ServerTransport> Server<T> {
    pub fn new(config: ServerConfig, transport: T, reader: TarballReader) -> Result<Self> {
        if reader.files().is_empty() {
            return Err(Error::PreconditionFailed);
        }
        let hash_id = reader.hash_id();
        let metadata = reader.metadata_bytes()?;
        let metadata_sections = metadata
            .chunks(config.chunk_size)
            .map(|c| c.to_vec())
            .collect::<Vec<_>>();

        log::info!(
            "serving {} files ({} bytes) as {hash_id} in {} metadata sections",
            reader.files().len(),
            reader.len(),
            metadata_sections.len()
        );

        Ok(Self {
            config,
            transport,
            reader,
            hash_id,
            metadata_sections,
            stats: ServerStats::default(),
        })
    }

    /// Runs the announce/responder/data-pump loop until `shutdown` resolves.
    pub async fn run(&mut self, shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        let pump_interval = self.pump_interval();
        let mut announce_timer = tokio::time::interval(self.config.announce_interval);
        let mut stats_timer = tokio::time::interval(Duration::from_secs(1));
        let mut pump_timer = tokio::time::interval(pump_interval);
        let mut cursor: u64 = 0;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("server shutdown requested");
                    return Ok(());
                }
                _ = announce_timer.tick() => {
                    self.announce().await?;
                }
                _ = stats_timer.tick() => {
                    self.stats.tick_rate();
                }
                _ = pump_timer.tick() => {
                    self.pump_once(&mut cursor).await?;
                }
                datagram = self.transport.recv_control() => {
                    self.handle_control(datagram?).await?;
                }
            }
        }
    }

    fn pump_interval(&self) -> Duration {
        match self.config.bytes_per_sec {
            Some(bps) if bps > 0 => {
                Duration::from_secs_f64(self.config.chunk_size as f64 / bps as f64)
            }
            _ => Duration::from_millis(1),
        }
    }

    async fn announce(&self) -> Result<()> {
        let msg = Message::AnnounceTarball {
            hash_id: self.hash_id,
        };
        self.transport.send_control(&msg.encode()).await?;
        Ok(())
    }

    async fn handle_control(&mut self, datagram: Vec<u8>) -> Result<()> {
        let message = match Message::decode(&datagram) {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(()), // unknown opcode, ignore per §4.B
            Err(e) => {
                log::warn!("dropping malformed control datagram: {e}");
                return Ok(());
            }
        };

        if message.hash_id() != self.hash_id {
            return Ok(());
        }

        match message {
            Message::RequestMetadataHeader { .. } => {
                let reply = Message::RespondMetadataHeader {
                    hash_id: self.hash_id,
                    section_count: self.metadata_sections.len() as u16,
                };
                self.transport.send_control(&reply.encode()).await?;
            }
            Message::RequestMetadataSection { index, .. } => {
                if let Some(data) = self.metadata_sections.get(index as usize) {
                    let reply = Message::RespondMetadataSection {
                        hash_id: self.hash_id,
                        index,
                        data: data.clone(),
                    };
                    self.transport.send_control(&reply.encode()).await?;
                }
            }
            Message::AckDataSection { start, end_ex, .. } => {
                self.stats.observe_hint(Region::new(start, end_ex));
            }
            _ => {}
        }
        Ok(())
    }

    async fn pump_once(&mut self, cursor: &mut u64) -> Result<()> {
        let size = self.reader.len();
        if size == 0 {
            return Ok(());
        }

        if let Some(rewound) = self.stats.take_rewind(*cursor) {
            log::debug!("data pump biasing toward NAK hint at {rewound}");
            *cursor = rewound;
        }

        let want = (self.config.chunk_size as u64).min(size - *cursor) as usize;
        let mut buf = vec![0u8; want];
        let n = self.reader.read_at(&mut buf, *cursor)?;
        buf.truncate(n);

        let msg = Message::DataSection {
            hash_id: self.hash_id,
            offset: *cursor,
            data: buf,
        };
        self.transport.send_data(&msg.encode()).await?;
        self.stats.record_sent(n);

        *cursor += n as u64;
        if *cursor >= size {
            *cursor = 0;
        }
        Ok(())
    }
}
