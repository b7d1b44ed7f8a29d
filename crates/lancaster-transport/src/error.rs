use thiserror::Error;

/// Errors the transport layer can report.
///
/// Per the protocol's error policy, a transport error is fatal to the
/// current session: it propagates up to the endpoint's event loop, which
/// terminates.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to join multicast group {group}: {source}")]
    JoinMulticast {
        group: std::net::Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    #[error("channel closed")]
    Closed,
}
