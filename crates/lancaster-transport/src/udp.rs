//! Real multicast transport over `tokio::net::UdpSocket`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;

use crate::config::McastConfig;
use crate::error::TransportError;
use crate::traits::{ClientTransport, ServerTransport};

/// Maximum datagram size accepted on either socket. Comfortably above
/// [`lancaster_proto::DEFAULT_CHUNK_SIZE`] plus framing overhead.
const MAX_DATAGRAM: usize = 65536;

/// A bound pair of multicast UDP sockets: control (group:port) and data
/// (group:port+1). Both server and client endpoints construct one of these
/// and use whichever half of [`ServerTransport`]/[`ClientTransport`] matches
/// their role — the same socket pair backs both, per §4.D.
pub struct UdpTransport {
    control: UdpSocket,
    control_addr: SocketAddr,
    data: UdpSocket,
    data_addr: SocketAddr,
}

impl UdpTransport {
    /// Binds and joins the multicast group named by `config`.
    ///
    /// Sockets are deliberately left unconnected: a connected UDP socket
    /// only delivers datagrams from its one connected peer, but multicast
    /// senders here are identified by the group address, not by the
    /// per-sender source address recv would otherwise filter on.
    pub async fn bind(config: &McastConfig) -> Result<Self, TransportError> {
        let control = bind_multicast(config, config.control_addr()).await?;
        let data = bind_multicast(config, config.data_addr()).await?;
        log::info!(
            "bound multicast transport: control={} data={}",
            config.control_addr(),
            config.data_addr()
        );
        Ok(Self {
            control,
            control_addr: config.control_addr().into(),
            data,
            data_addr: config.data_addr().into(),
        })
    }
}

async fn bind_multicast(
    config: &McastConfig,
    addr: SocketAddrV4,
) -> Result<UdpSocket, TransportError> {
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, addr.port()));
    let socket = UdpSocket::bind(bind_addr).await?;

    socket
        .join_multicast_v4(*addr.ip(), config.interface.unwrap_or(Ipv4Addr::UNSPECIFIED))
        .map_err(|source| TransportError::JoinMulticast {
            group: *addr.ip(),
            source,
        })?;
    socket.set_multicast_loop_v4(config.loopback)?;
    socket.set_multicast_ttl_v4(config.ttl)?;

    Ok(socket)
}

async fn recv(socket: &UdpSocket) -> Result<Vec<u8>, TransportError> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let (n, _from) = socket.recv_from(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}

async fn send(socket: &UdpSocket, to: SocketAddr, msg: &[u8]) -> Result<(), TransportError> {
    socket.send_to(msg, to).await?;
    Ok(())
}

impl ServerTransport for UdpTransport {
    async fn recv_control(&self) -> Result<Vec<u8>, TransportError> {
        recv(&self.control).await
    }

    async fn send_control(&self, msg: &[u8]) -> Result<(), TransportError> {
        send(&self.control, self.control_addr, msg).await
    }

    async fn send_data(&self, msg: &[u8]) -> Result<(), TransportError> {
        send(&self.data, self.data_addr, msg).await
    }
}

impl ClientTransport for UdpTransport {
    async fn send_control(&self, msg: &[u8]) -> Result<(), TransportError> {
        send(&self.control, self.control_addr, msg).await
    }

    async fn recv_control(&self) -> Result<Vec<u8>, TransportError> {
        recv(&self.control).await
    }

    async fn recv_data(&self) -> Result<Vec<u8>, TransportError> {
        recv(&self.data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Loopback-only integration test: a datagram sent on one logical
    /// channel arrives on the matching recv side, using real sockets bound
    /// to the same host.
    #[tokio::test]
    async fn loopback_round_trips_control_and_data() {
        let config = McastConfig {
            control_port: 17360,
            loopback: true,
            ..Default::default()
        };

        let server = UdpTransport::bind(&config).await.unwrap();
        let client = UdpTransport::bind(&config).await.unwrap();

        ServerTransport::send_control(&server, b"announce").await.unwrap();
        let got = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            ClientTransport::recv_control(&client),
        )
        .await
        .expect("timed out waiting for control datagram")
        .unwrap();
        assert_eq!(got, b"announce");

        ServerTransport::send_data(&server, b"chunk").await.unwrap();
        let got = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            ClientTransport::recv_data(&client),
        )
        .await
        .expect("timed out waiting for data datagram")
        .unwrap();
        assert_eq!(got, b"chunk");
    }
}
