//! Two-socket UDP multicast transport for the lancaster protocol.
//!
//! A control socket carries `ControlToServer`/`ControlToClient` traffic;
//! a data socket (control port + 1) carries `Data` traffic server→clients.
//! See [`traits::ServerTransport`]/[`traits::ClientTransport`] for the roles,
//! [`udp::UdpTransport`] for the real implementation, and [`mock`] for an
//! in-memory pair with injectable drop/reorder used in protocol tests.

pub mod config;
pub mod error;
pub mod mock;
pub mod traits;
pub mod udp;

pub use config::{DEFAULT_GROUP, McastConfig};
pub use error::TransportError;
pub use mock::{Impairment, InitialDrop, MockClientHalf, MockServerHalf, mock_pair};
pub use traits::{ClientTransport, ServerTransport};
pub use udp::UdpTransport;
