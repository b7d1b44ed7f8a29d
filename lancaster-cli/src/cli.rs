use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lancaster_proto::HashId;
use lancaster_transport::{DEFAULT_GROUP, McastConfig};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Local interface address to bind the multicast sockets to.
    #[arg(long)]
    pub interface: Option<Ipv4Addr>,

    /// Multicast group and control port, as `host:port`.
    #[arg(long, default_value_t = default_group())]
    pub group: String,

    /// Multicast TTL (hop count).
    #[arg(long, default_value_t = 8)]
    pub ttl: u32,

    /// Enables multicast loopback, so a sender also receives its own traffic.
    #[arg(long)]
    pub loopback: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn default_group() -> String {
    format!("{DEFAULT_GROUP}:{}", lancaster_proto::DEFAULT_CONTROL_PORT)
}

#[derive(Subcommand)]
pub enum Commands {
    /// Receives a tarball from the multicast group and writes it to disk.
    Download(DownloadCmd),
    /// Announces and serves a tarball assembled from the given file/dir specs.
    Serve(ServeCmd),
    /// Prints the content hash_id a set of file/dir specs would produce.
    Id(IdCmd),
    /// Lists the files a set of file/dir specs would include, without hashing.
    Ls(LsCmd),
}

#[derive(Parser, Debug)]
pub struct DownloadCmd {
    /// Only accept a tarball with this hash_id, skipping the wait for an
    /// announcement entirely.
    pub hash_id: Option<HashId>,

    /// Destination directory (defaults to the current directory).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ServeCmd {
    /// File/directory specs: `path`, `path::alias`, `dir::subdir`, or
    /// `dir:::subdir` (triple colon recurses into subdirectories).
    #[arg(required = true)]
    pub specs: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct IdCmd {
    #[arg(required = true)]
    pub specs: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct LsCmd {
    #[arg(required = true)]
    pub specs: Vec<String>,
}

impl Cli {
    pub fn mcast_config(&self) -> Result<McastConfig, String> {
        let (host, port) = self
            .group
            .split_once(':')
            .ok_or_else(|| format!("--group must be host:port, got {:?}", self.group))?;
        let group: Ipv4Addr = host
            .parse()
            .map_err(|e| format!("invalid multicast group {host:?}: {e}"))?;
        let control_port: u16 = port
            .parse()
            .map_err(|e| format!("invalid port {port:?}: {e}"))?;

        Ok(McastConfig {
            group,
            control_port,
            ttl: self.ttl,
            loopback: self.loopback,
            interface: self.interface,
        })
    }
}
