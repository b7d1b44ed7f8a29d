//! Client state machine: announce → metadata → data → done (§4.F).

use std::path::PathBuf;

use tokio::time::Instant;

use lancaster_nak::{NakRegions, Region};
use lancaster_proto::{HashId, Message};
use lancaster_tarball::{TarballWriter, WriteAt};
use lancaster_transport::ClientTransport;

use crate::config::ClientConfig;
use crate::error::Result;

/// One of the five states a receiver moves through, per §3/§4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    ExpectAnnouncement,
    ExpectMetadataHeader,
    ExpectMetadataSections,
    ExpectDataSections,
    Done,
}

/// Drives one receiver through the protocol against a [`ClientTransport`],
/// writing the reconstructed tarball under `dest_dir`.
pub struct Client<T: ClientTransport> {
    config: ClientConfig,
    transport: T,
    dest_dir: PathBuf,

    state: ClientState,
    /// Latched after the first matching announcement, or immediately at
    /// construction if the operator supplied an override (§9).
    hash_id: Option<HashId>,

    metadata_section_count: u16,
    metadata_sections: Vec<Option<Vec<u8>>>,
    next_section_index: u16,

    /// Non-nil (empty, universe size 0) from construction — never
    /// uninitialized, per §9's note on the source's `Client.Run` bug.
    nak_regions: NakRegions,
    /// Most recent region observed in a data message; the heuristic hint
    /// sent back as `AckDataSection`. Starts at `(0, 0)`, also per §9.
    last_ack: Region,

    writer: Option<TarballWriter>,

    /// The last control message this client sent, resent verbatim when the
    /// resend timer fires.
    last_request: Vec<u8>,
    next_resend: Instant,

    /// Optional progress observer, invoked with `(bytes_received, total)`
    /// whenever the data phase makes progress. Driven by the CLI's download
    /// progress bar; unused by the protocol itself.
    progress: Option<Box<dyn FnMut(u64, u64) + Send>>,
}

impl<T: ClientTransport> Client<T> {
    pub fn new(config: ClientConfig, transport: T, dest_dir: PathBuf) -> Self {
        let (state, hash_id) = match config.expected_hash_id {
            Some(id) => (ClientState::ExpectMetadataHeader, Some(id)),
            None => (ClientState::ExpectAnnouncement, None),
        };
        let next_resend = Instant::now() + config.resend_interval;

        Self {
            config,
            transport,
            dest_dir,
            state,
            hash_id,
            metadata_section_count: 0,
            metadata_sections: Vec::new(),
            next_section_index: 0,
            nak_regions: NakRegions::new(0),
            last_ack: Region::new(0, 0),
            writer: None,
            last_request: Vec::new(),
            next_resend,
            progress: None,
        }
    }

    /// Registers a callback invoked with `(bytes_received, total)` each time
    /// the data phase advances. Used by the CLI to drive a progress bar.
    pub fn set_progress_callback(&mut self, callback: impl FnMut(u64, u64) + Send + 'static) {
        self.progress = Some(Box::new(callback));
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Bytes received so far and the tarball's total size, once known.
    /// Both are `0` before the metadata phase completes.
    pub fn progress(&self) -> (u64, u64) {
        let total = self.nak_regions.size();
        let outstanding: u64 = self.nak_regions.regions().iter().map(|r| r.len()).sum();
        (total.saturating_sub(outstanding), total)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ClientState::Done)
    }

    pub fn hash_id(&self) -> Option<HashId> {
        self.hash_id
    }

    /// Runs the client loop until the transfer reaches [`ClientState::Done`].
    pub async fn run(&mut self) -> Result<()> {
        if self.hash_id.is_some()
            && matches!(self.state, ClientState::ExpectMetadataHeader)
            && self.last_request.is_empty()
        {
            self.send_request_metadata_header().await?;
        }

        loop {
            if matches!(self.state, ClientState::Done) {
                return Ok(());
            }

            let in_data_phase = matches!(self.state, ClientState::ExpectDataSections);
            tokio::select! {
                _ = tokio::time::sleep_until(self.next_resend) => {
                    self.resend().await?;
                }
                datagram = self.transport.recv_control() => {
                    self.handle_control(datagram?).await?;
                }
                datagram = self.transport.recv_data(), if in_data_phase => {
                    self.handle_data(datagram?).await?;
                }
            }
        }
    }

    async fn handle_control(&mut self, datagram: Vec<u8>) -> Result<()> {
        let message = match Message::decode(&datagram) {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("dropping malformed control datagram: {e}");
                return Ok(());
            }
        };

        if let ClientState::ExpectAnnouncement = self.state {
            if let Message::AnnounceTarball { hash_id } = message {
                log::info!("received announcement for {hash_id}");
                self.hash_id = Some(hash_id);
                self.state = ClientState::ExpectMetadataHeader;
                self.send_request_metadata_header().await?;
            }
            return Ok(());
        }

        // Every other state has a latched hash_id; messages for a
        // different one are dropped silently (§8's ignore-mismatched test).
        let Some(expected) = self.hash_id else {
            return Ok(());
        };
        if message.hash_id() != expected {
            return Ok(());
        }

        match (self.state, message) {
            (
                ClientState::ExpectMetadataHeader,
                Message::RespondMetadataHeader { section_count, .. },
            ) => {
                self.metadata_section_count = section_count;
                self.metadata_sections = vec![None; section_count as usize];
                self.next_section_index = 0;
                if section_count == 0 {
                    log::warn!("server announced zero metadata sections, ignoring");
                    return Ok(());
                }
                self.state = ClientState::ExpectMetadataSections;
                self.send_request_metadata_section(0).await?;
            }
            (
                ClientState::ExpectMetadataSections,
                Message::RespondMetadataSection { index, data, .. },
            ) => {
                if index == self.next_section_index {
                    self.metadata_sections[index as usize] = Some(data);
                    self.next_section_index += 1;
                    if self.next_section_index == self.metadata_section_count {
                        self.finish_metadata().await?;
                    } else {
                        self.send_request_metadata_section(self.next_section_index)
                            .await?;
                    }
                } else {
                    self.send_request_metadata_section(self.next_section_index)
                        .await?;
                }
            }
            _ => {} // anything not meant for the current phase is ignored
        }
        Ok(())
    }

    async fn handle_data(&mut self, datagram: Vec<u8>) -> Result<()> {
        if !matches!(self.state, ClientState::ExpectDataSections) {
            return Ok(()); // NotReady: data before metadata, silently ignored
        }

        let message = match Message::decode(&datagram) {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("dropping malformed data datagram: {e}");
                return Ok(());
            }
        };

        let Message::DataSection {
            hash_id,
            offset,
            data,
        } = message
        else {
            return Ok(());
        };
        if Some(hash_id) != self.hash_id {
            return Ok(());
        }

        let end_ex = offset + data.len() as u64;
        if end_ex == offset {
            return Ok(());
        }
        if end_ex > self.nak_regions.size() {
            log::warn!(
                "dropping data datagram [{offset}, {end_ex}) exceeding tarball size {}",
                self.nak_regions.size()
            );
            return Ok(());
        }
        if self.nak_regions.is_acked(offset, end_ex) {
            return Ok(());
        }

        self.nak_regions.ack(offset, end_ex);
        if let Some(writer) = &self.writer {
            writer.write_at(&data, offset)?;
        }
        self.last_ack = Region::new(offset, end_ex);

        let (received, total) = self.progress();
        if let Some(callback) = &mut self.progress {
            callback(received, total);
        }

        if self.nak_regions.is_all_acked() {
            self.finish().await?;
        } else {
            self.send_ack(self.last_ack).await?;
        }
        Ok(())
    }

    async fn finish_metadata(&mut self) -> Result<()> {
        let metadata: Vec<u8> = self
            .metadata_sections
            .iter()
            .flat_map(|s| s.as_ref().expect("all sections received").iter().copied())
            .collect();

        let hash_id = self.hash_id.expect("latched before metadata can arrive");
        let writer = TarballWriter::create(&self.dest_dir, hash_id, &metadata)?;
        let size = WriteAt::len(&writer);

        self.nak_regions.clear(size);
        self.writer = Some(writer);
        self.last_ack = Region::new(0, 0);
        self.state = ClientState::ExpectDataSections;

        if self.nak_regions.is_all_acked() {
            self.finish().await?;
        } else {
            self.send_ack(self.last_ack).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        self.state = ClientState::Done;
        log::info!("transfer complete");
        Ok(())
    }

    async fn send_request_metadata_header(&mut self) -> Result<()> {
        let hash_id = self.hash_id.expect("hash_id latched before requesting metadata");
        self.send_control_message(Message::RequestMetadataHeader { hash_id })
            .await
    }

    async fn send_request_metadata_section(&mut self, index: u16) -> Result<()> {
        let hash_id = self.hash_id.expect("hash_id latched before requesting sections");
        self.send_control_message(Message::RequestMetadataSection { hash_id, index })
            .await
    }

    async fn send_ack(&mut self, region: Region) -> Result<()> {
        let hash_id = self.hash_id.expect("hash_id latched before acking");
        self.send_control_message(Message::AckDataSection {
            hash_id,
            start: region.start,
            end_ex: region.end_ex,
        })
        .await
    }

    async fn send_control_message(&mut self, message: Message) -> Result<()> {
        let bytes = message.encode();
        self.transport.send_control(&bytes).await?;
        self.last_request = bytes;
        self.next_resend = Instant::now() + self.config.resend_interval;
        Ok(())
    }

    async fn resend(&mut self) -> Result<()> {
        if !self.last_request.is_empty() {
            log::debug!("resend timer fired in state {:?}", self.state);
            self.transport.send_control(&self.last_request.clone()).await?;
        }
        self.next_resend = Instant::now() + self.config.resend_interval;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use lancaster_transport::{Impairment, ServerTransport, mock_pair};

    fn id(byte: u8) -> HashId {
        HashId::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn resend_timer_retransmits_last_request_verbatim() {
        let (server_half, client_half) = mock_pair(Impairment::none(), 100);
        let config = ClientConfig {
            resend_interval: StdDuration::from_millis(20),
            expected_hash_id: Some(id(9)),
        };
        let dest = tempfile::tempdir().unwrap();
        let mut client = Client::new(config, client_half, dest.path().to_path_buf());

        let client_task = tokio::spawn(async move {
            let _ = client.run().await;
        });

        let first = tokio::time::timeout(StdDuration::from_secs(1), server_half.recv_control())
            .await
            .expect("initial request was not sent")
            .unwrap();
        let second = tokio::time::timeout(StdDuration::from_secs(1), server_half.recv_control())
            .await
            .expect("resend timer did not fire")
            .unwrap();

        assert_eq!(
            first, second,
            "resend timer must retransmit the last request verbatim"
        );

        client_task.abort();
    }

    #[tokio::test]
    async fn mismatched_hash_id_leaves_receiver_state_unchanged() {
        let (_server_half, client_half) = mock_pair(Impairment::none(), 11);
        let config = ClientConfig {
            expected_hash_id: Some(id(1)),
            ..Default::default()
        };
        let dest = tempfile::tempdir().unwrap();
        let mut client = Client::new(config, client_half, dest.path().to_path_buf());

        let state_before = client.state;
        let nak_regions_before = client.nak_regions.clone();
        let last_ack_before = client.last_ack;
        let next_section_before = client.next_section_index;

        let foreign = Message::RespondMetadataHeader {
            hash_id: id(2),
            section_count: 7,
        };
        client.handle_control(foreign.encode()).await.unwrap();

        assert_eq!(client.state, state_before);
        assert_eq!(client.nak_regions, nak_regions_before);
        assert_eq!(client.last_ack, last_ack_before);
        assert_eq!(client.next_section_index, next_section_before);
    }
}
