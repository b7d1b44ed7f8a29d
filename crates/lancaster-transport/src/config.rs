use std::net::Ipv4Addr;

/// Multicast group, ports, TTL and interface selection shared by server and
/// client endpoints.
///
/// The data socket is always `control_port + 1`, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McastConfig {
    pub group: Ipv4Addr,
    pub control_port: u16,
    pub ttl: u32,
    /// Loopback is opt-in, for same-host testing; real deployments across
    /// distinct hosts don't need it and it would otherwise make an endpoint
    /// hear its own broadcasts.
    pub loopback: bool,
    /// Local interface to join the group on. `None` lets the OS pick.
    pub interface: Option<Ipv4Addr>,
}

/// Default administratively-scoped multicast group used by the CLI.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(236, 0, 0, 100);

impl Default for McastConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            control_port: lancaster_proto::DEFAULT_CONTROL_PORT,
            ttl: 8,
            loopback: false,
            interface: None,
        }
    }
}

impl McastConfig {
    pub fn data_port(&self) -> u16 {
        self.control_port + 1
    }

    pub fn control_addr(&self) -> std::net::SocketAddrV4 {
        std::net::SocketAddrV4::new(self.group, self.control_port)
    }

    pub fn data_addr(&self) -> std::net::SocketAddrV4 {
        std::net::SocketAddrV4::new(self.group, self.data_port())
    }
}
