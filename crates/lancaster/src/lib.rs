//! Server and client state machines for the reliable-multicast file
//! transfer protocol, built on `lancaster-nak`, `lancaster-proto`,
//! `lancaster-tarball` and `lancaster-transport`.

pub mod client;
pub mod config;
pub mod error;
pub mod server;

pub use client::{Client, ClientState};
pub use config::{ClientConfig, ServerConfig};
pub use error::{Error, Result};
pub use server::Server;
