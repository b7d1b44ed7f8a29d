//! Role-specific transport traits.
//!
//! A single concrete type can implement both — [`crate::udp::UdpTransport`]
//! does, since a real control socket is bound and used identically by
//! servers and clients (§4.D: "both server and clients send and receive on
//! it"). The in-memory [`crate::mock`] pairing instead hands out two
//! distinct halves, one per role, wired together by channels.

use crate::error::TransportError;

/// The server's view of the transport: receive requests on the control
/// channel, multicast responses and announcements back, and push data
/// chunks out on the data channel.
pub trait ServerTransport: Send + Sync {
    /// Receives one datagram from the `ControlToServer` channel (a client's
    /// request). Delivered whole, no reassembly.
    fn recv_control(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Sends one datagram on the `ControlToClient` channel (multicast to
    /// every listening client).
    fn send_control(&self, msg: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends one datagram on the `Data` channel.
    fn send_data(&self, msg: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The client's view of the transport: send requests on the control
/// channel, and receive both the server's control responses and its data
/// chunks.
pub trait ClientTransport: Send + Sync {
    /// Sends one datagram on the `ControlToServer` channel.
    fn send_control(&self, msg: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives one datagram from the `ControlToClient` channel (an
    /// announcement or a response to this or another client's request).
    fn recv_control(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Receives one datagram from the `Data` channel.
    fn recv_data(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
